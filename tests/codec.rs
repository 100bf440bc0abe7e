//! SingleFrameCodec integration tests.
//!
//! Decoders here are test doubles: `ImmediateDecoder` completes inside
//! `decode`, `ManualDecoder` parks completions until the test fires them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use frame_bridge::{
    BridgeError, Codec, ContextOptions, DecodeCompletion, DecoderService, ExecutionContext,
    ImageDescriptor, SingleFrameCodec, Value,
};
use image::DynamicImage;

const TIMEOUT: Duration = Duration::from_secs(5);

struct ImmediateDecoder {
    width: u32,
    height: u32,
    calls: AtomicUsize,
}

impl ImmediateDecoder {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: AtomicUsize::new(0),
        }
    }
}

impl DecoderService for ImmediateDecoder {
    fn decode(&self, _descriptor: ImageDescriptor, on_complete: DecodeCompletion) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        on_complete(Ok(DynamicImage::new_rgb8(self.width, self.height)));
    }
}

#[derive(Default)]
struct ManualDecoder {
    pending: Mutex<Vec<(ImageDescriptor, DecodeCompletion)>>,
}

impl ManualDecoder {
    fn take(&self) -> Vec<(ImageDescriptor, DecodeCompletion)> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

impl DecoderService for ManualDecoder {
    fn decode(&self, descriptor: ImageDescriptor, on_complete: DecodeCompletion) {
        self.pending.lock().unwrap().push((descriptor, on_complete));
    }
}

fn sample_codec() -> Arc<SingleFrameCodec> {
    Arc::new(SingleFrameCodec::new(ImageDescriptor::new(vec![0u8; 64])))
}

// ── Static metadata ────────────────────────────────────────────────

#[test]
fn reports_one_frame_and_no_repetitions() {
    let codec = sample_codec();
    assert_eq!(codec.frame_count(), 1);
    assert_eq!(codec.repetition_count(), 0);

    let empty = SingleFrameCodec::new(ImageDescriptor::empty());
    assert_eq!(empty.frame_count(), 1);
    assert_eq!(empty.repetition_count(), 0);
}

#[test]
fn metadata_unchanged_after_decode() {
    let decoder = Arc::new(ImmediateDecoder::new(2, 2));
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    let task_codec = codec.clone();
    context
        .call(move |scope| {
            let callback = Value::function(|_scope, _frame| Ok(Value::Null));
            task_codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decode submitted");
    context.call(|_scope| ()).expect("context alive");

    assert_eq!(codec.frame_count(), 1);
    assert_eq!(codec.repetition_count(), 0);
}

#[test]
fn trait_object_reports_same_metadata() {
    let codec: Arc<dyn Codec> = sample_codec();
    assert_eq!(codec.frame_count(), 1);
    assert_eq!(codec.repetition_count(), 0);
    assert_eq!(codec.allocation_size(), 64 + SingleFrameCodec::OVERHEAD);
}

// ── Preconditions ──────────────────────────────────────────────────

#[test]
fn non_function_callback_is_invalid_argument() {
    let decoder = Arc::new(ImmediateDecoder::new(1, 1));
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder.clone()))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    let result = context
        .call(move |scope| {
            codec
                .get_next_frame(scope, &Value::from(42.0))
                .map_err(|error| error.to_string())
        })
        .expect("context alive");

    assert_eq!(result, Err("Callback must be a function".to_string()));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_decoder_is_service_unavailable() {
    let context = ExecutionContext::spawn(ContextOptions::new()).expect("Failed to spawn context");
    let codec = sample_codec();

    let (unavailable, live_handles) = context
        .call(move |scope| {
            let callback = Value::function(|_scope, _frame| Ok(Value::Null));
            let result = codec.get_next_frame(scope, &callback);
            (
                matches!(result, Err(BridgeError::ServiceUnavailable)),
                scope.live_handles(),
            )
        })
        .expect("context alive");

    assert!(unavailable);
    assert_eq!(live_handles, 0, "no completion handle should be created");
}

#[test]
fn script_convention_returns_message_or_null() {
    let context = ExecutionContext::spawn(ContextOptions::new()).expect("Failed to spawn context");
    let codec = sample_codec();

    let messages = context
        .call(move |scope| {
            let not_callable = codec.get_next_frame_value(scope, &Value::Null);
            let callback = Value::function(|_scope, _frame| Ok(Value::Null));
            let no_decoder = codec.get_next_frame_value(scope, &callback);
            (
                not_callable.as_str().map(str::to_owned),
                no_decoder.as_str().map(str::to_owned),
            )
        })
        .expect("context alive");

    assert_eq!(messages.0.as_deref(), Some("Callback must be a function"));
    assert_eq!(messages.1.as_deref(), Some("Image decoder not available."));
}

#[test]
fn script_convention_returns_null_on_submission() {
    let decoder = Arc::new(ImmediateDecoder::new(1, 1));
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    let returned_null = context
        .call(move |scope| {
            let callback = Value::function(|_scope, _frame| Ok(Value::Null));
            codec.get_next_frame_value(scope, &callback).is_null()
        })
        .expect("context alive");

    assert!(returned_null);
}

// ── Delivery ───────────────────────────────────────────────────────

#[test]
fn delivers_exactly_once_with_zero_duration() {
    let decoder = Arc::new(ImmediateDecoder::new(3, 2));
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder.clone()))
        .expect("Failed to spawn context");
    let codec = sample_codec();
    let invocations = Arc::new(AtomicUsize::new(0));

    let (sender, receiver) = mpsc::channel();
    let counter = invocations.clone();
    context
        .call(move |scope| {
            let callback = Value::function(move |_scope, argument| {
                counter.fetch_add(1, Ordering::SeqCst);
                let frame = argument.as_frame().expect("frame argument");
                sender
                    .send((frame.image().width(), frame.image().height(), frame.duration()))
                    .unwrap();
                Ok(Value::Null)
            });
            codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decode submitted");

    let (width, height, duration) = receiver.recv_timeout(TIMEOUT).expect("frame delivered");
    assert_eq!((width, height), (3, 2));
    assert_eq!(duration, Duration::ZERO);

    // Drain the queue: the callback has run and been released.
    let live_handles = context.call(|scope| scope.live_handles()).expect("context alive");
    assert_eq!(live_handles, 0);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        receiver.recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Disconnected),
        "callback should be dropped after delivery",
    );
}

#[test]
fn callback_runs_on_context_thread() {
    let decoder = Arc::new(ManualDecoder::default());
    let context = ExecutionContext::spawn(
        ContextOptions::new()
            .with_name("affinity")
            .with_decoder(decoder.clone()),
    )
    .expect("Failed to spawn context");
    let codec = sample_codec();

    let (sender, receiver) = mpsc::channel();
    context
        .call(move |scope| {
            let callback = Value::function(move |scope, _frame| {
                let on_context = scope.context().is_current_thread();
                let name = thread::current().name().map(str::to_owned);
                sender.send((on_context, name)).unwrap();
                Ok(Value::Null)
            });
            codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decode submitted");

    let worker = thread::spawn(move || {
        for (_descriptor, completion) in decoder.take() {
            completion(Ok(DynamicImage::new_rgb8(1, 1)));
        }
    });
    worker.join().unwrap();

    let (on_context, name) = receiver.recv_timeout(TIMEOUT).expect("frame delivered");
    assert!(on_context);
    assert_eq!(name.as_deref(), Some("affinity"));
}

#[test]
fn decode_failure_delivers_null() {
    let decoder = Arc::new(ManualDecoder::default());
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder.clone()))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    let (sender, receiver) = mpsc::channel();
    context
        .call(move |scope| {
            let callback = Value::function(move |_scope, argument| {
                sender.send(argument.is_null()).unwrap();
                Ok(Value::Null)
            });
            codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decode submitted");

    for (_descriptor, completion) in decoder.take() {
        completion(Err(BridgeError::DecodeError("truncated".to_string())));
    }

    assert!(receiver.recv_timeout(TIMEOUT).expect("callback invoked"));
}

#[test]
fn failing_callback_does_not_break_context() {
    let decoder = Arc::new(ImmediateDecoder::new(1, 1));
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    context
        .call(move |scope| {
            let callback = Value::function(|_scope, _frame| {
                Err(BridgeError::ScriptError("boom".to_string()))
            });
            codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decode submitted");

    let live_handles = context.call(|scope| scope.live_handles()).expect("context alive");
    assert_eq!(live_handles, 0);
}

// ── Independent submissions ────────────────────────────────────────

#[test]
fn concurrent_submissions_complete_independently() {
    let decoder = Arc::new(ManualDecoder::default());
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder.clone()))
        .expect("Failed to spawn context");
    let codec = sample_codec();

    let (sender, receiver) = mpsc::channel();
    context
        .call(move |scope| {
            for tag in ["first", "second"] {
                let sender = sender.clone();
                let callback = Value::function(move |_scope, argument| {
                    let width = argument.as_frame().expect("frame").image().width();
                    sender.send((tag, width)).unwrap();
                    Ok(Value::Null)
                });
                codec.get_next_frame(scope, &callback)?;
            }
            Ok::<_, BridgeError>(scope.live_handles())
        })
        .expect("context alive")
        .map(|live| assert_eq!(live, 2))
        .expect("decodes submitted");

    let mut pending = decoder.take();
    assert_eq!(pending.len(), 2, "each call submits its own decode");

    // Complete in reverse order, from separate threads.
    let (_, second) = pending.pop().unwrap();
    let (_, first) = pending.pop().unwrap();
    thread::spawn(move || second(Ok(DynamicImage::new_rgb8(20, 1))))
        .join()
        .unwrap();
    thread::spawn(move || first(Ok(DynamicImage::new_rgb8(10, 1))))
        .join()
        .unwrap();

    let mut delivered = vec![
        receiver.recv_timeout(TIMEOUT).expect("first delivery"),
        receiver.recv_timeout(TIMEOUT).expect("second delivery"),
    ];
    delivered.sort();
    assert_eq!(delivered, vec![("first", 10), ("second", 20)]);

    let live_handles = context.call(|scope| scope.live_handles()).expect("context alive");
    assert_eq!(live_handles, 0);
    assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn each_submission_clones_the_same_descriptor() {
    let decoder = Arc::new(ManualDecoder::default());
    let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder.clone()))
        .expect("Failed to spawn context");
    let codec = sample_codec();
    let expected = codec.descriptor().data().map(<[u8]>::as_ptr);

    let task_codec = codec.clone();
    context
        .call(move |scope| {
            let callback = Value::function(|_scope, _frame| Ok(Value::Null));
            task_codec.get_next_frame(scope, &callback)?;
            task_codec.get_next_frame(scope, &callback)
        })
        .expect("context alive")
        .expect("decodes submitted");

    let pending = decoder.take();
    assert_eq!(pending.len(), 2);
    for (descriptor, _completion) in &pending {
        assert_eq!(descriptor.data().map(<[u8]>::as_ptr), expected);
    }
}

// ── Allocation accounting ──────────────────────────────────────────

#[test]
fn allocation_size_counts_encoded_bytes() {
    let codec = SingleFrameCodec::new(ImageDescriptor::new(vec![7u8; 1000]));
    assert_eq!(codec.allocation_size(), 1000 + SingleFrameCodec::OVERHEAD);
}

#[test]
fn allocation_size_without_data_is_overhead() {
    let absent = SingleFrameCodec::new(ImageDescriptor::empty());
    assert_eq!(absent.allocation_size(), SingleFrameCodec::OVERHEAD);

    let empty = SingleFrameCodec::new(ImageDescriptor::new(Vec::<u8>::new()));
    assert_eq!(empty.allocation_size(), SingleFrameCodec::OVERHEAD);
}

#[test]
fn overhead_is_nonzero() {
    assert!(SingleFrameCodec::OVERHEAD > 0);
}
