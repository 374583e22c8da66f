use crate::sandbox::{SandboxConfig, SandboxError, SandboxOutcome};
use rquickjs::{Context, Ctx, Runtime};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const MEMORY_LIMIT_BYTES: usize = 32 * 1024 * 1024;
const STACK_LIMIT_BYTES: usize = 512 * 1024;

/// Installed before any user code runs. Traps the denied capability
/// surface so touching it raises `forbidden_api` instead of a plain
/// ReferenceError, freezes the allow-listed pure globals against
/// prototype tampering, and captures console output in order.
const PRELUDE: &str = r#"
(function () {
  const FORBIDDEN = [
    "fetch", "XMLHttpRequest", "WebSocket",
    "importScripts", "indexedDB", "caches"
  ];
  for (const name of FORBIDDEN) {
    globalThis[name] = function () {
      const error = new Error(name + " is forbidden");
      error.code = "forbidden_api";
      throw error;
    };
  }
  try { globalThis.navigator = undefined; } catch (ignored) {}

  const FROZEN = [
    "Math", "Date", "Number", "String", "Array", "JSON", "BigInt",
    "Int8Array", "Uint8Array", "Uint8ClampedArray",
    "Int16Array", "Uint16Array", "Int32Array", "Uint32Array",
    "Float32Array", "Float64Array", "BigInt64Array", "BigUint64Array"
  ];
  for (const name of FROZEN) {
    const target = globalThis[name];
    if (target && target.prototype) {
      Object.freeze(target.prototype);
    }
  }

  globalThis.__sandbox_logs = [];
  const capture = function () {
    globalThis.__sandbox_logs.push(
      Array.prototype.map.call(arguments, String).join(" ")
    );
  };
  globalThis.console = { log: capture, warn: capture, error: capture, info: capture };

  globalThis.__sandbox_finish = function (value) {
    if (value === undefined) {
      return { value: "undefined", stringified: true };
    }
    if (value === null) {
      return { value: null, stringified: false };
    }
    const kind = typeof value;
    if (kind === "object") {
      let text;
      try { text = JSON.stringify(value); } catch (error) { text = String(value); }
      return { value: text, stringified: true };
    }
    if (kind === "function" || kind === "symbol" || kind === "bigint") {
      return { value: String(value), stringified: true };
    }
    if (kind === "number" && !isFinite(value)) {
      return { value: String(value), stringified: true };
    }
    return { value: value, stringified: false };
  };
})();
"#;

#[derive(Debug, Deserialize)]
struct ShapedResult {
    value: Value,
    stringified: bool,
}

/// Runs one snippet on a fresh, single-shot QuickJS isolate.
///
/// The isolate lives on its own thread and reports back over a channel;
/// the caller races `recv_timeout` against it. On timeout the cancel
/// flag flips the engine's interrupt handler, which unwinds the
/// interpreter and lets the thread drop the runtime. Teardown happens
/// on every exit path because the thread owns every engine handle.
pub fn run_snippet(config: &SandboxConfig) -> Result<SandboxOutcome, SandboxError> {
    let (sender, receiver) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let worker_config = config.clone();
    let started = Instant::now();

    thread::Builder::new()
        .name("planweave-sandbox".to_string())
        .spawn(move || {
            let outcome = evaluate_snippet(&worker_config, &worker_cancel);
            // The receiver may already be gone after a caller-side
            // timeout; a failed send is the discarded late settlement.
            let _ = sender.send(outcome);
        })
        .map_err(|err| SandboxError::Unavailable(format!("failed to spawn worker: {err}")))?;

    match receiver.recv_timeout(Duration::from_millis(config.timeout_ms)) {
        Ok(Ok(mut outcome)) => {
            outcome.time_ms = started.elapsed().as_millis() as u64;
            Ok(outcome)
        }
        Ok(Err(error)) => Err(error),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            Err(SandboxError::Timeout {
                timeout_ms: config.timeout_ms,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SandboxError::Unavailable(
            "sandbox worker exited before reporting a result".to_string(),
        )),
    }
}

fn evaluate_snippet(
    config: &SandboxConfig,
    cancel: &Arc<AtomicBool>,
) -> Result<SandboxOutcome, SandboxError> {
    let runtime =
        Runtime::new().map_err(|err| SandboxError::Unavailable(err.to_string()))?;
    runtime.set_memory_limit(MEMORY_LIMIT_BYTES);
    runtime.set_max_stack_size(STACK_LIMIT_BYTES);

    let timeout_ms = config.timeout_ms;
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let interrupt_cancel = Arc::clone(cancel);
    runtime.set_interrupt_handler(Some(Box::new(move || {
        interrupt_cancel.load(Ordering::Relaxed) || Instant::now() >= deadline
    })));

    let context =
        Context::full(&runtime).map_err(|err| SandboxError::Unavailable(err.to_string()))?;

    context.with(|ctx| {
        ctx.eval::<(), _>(PRELUDE)
            .map_err(|err| classify_eval_error(&ctx, err, deadline, timeout_ms))?;

        let args_json = Value::Object(config.args.clone()).to_string();
        let args_value = ctx
            .json_parse(args_json)
            .map_err(|err| SandboxError::Runtime(err.to_string()))?;
        ctx.globals()
            .set("__sandbox_args", args_value)
            .map_err(|err| SandboxError::Runtime(err.to_string()))?;

        // The snippet body becomes the body of one synchronous function
        // taking `args`; it is expected to `return` its result.
        let wrapper = format!(
            "globalThis.__sandbox_run = function (args) {{\n\"use strict\";\n{}\n}};",
            config.code
        );
        ctx.eval::<(), _>(wrapper)
            .map_err(|err| classify_eval_error(&ctx, err, deadline, timeout_ms))?;

        let shaped: rquickjs::Value = ctx
            .eval("__sandbox_finish(__sandbox_run(__sandbox_args))")
            .map_err(|err| classify_eval_error(&ctx, err, deadline, timeout_ms))?;

        let shaped_json = ctx
            .json_stringify(shaped)
            .map_err(|err| SandboxError::Runtime(err.to_string()))?
            .ok_or_else(|| SandboxError::Runtime("result shaping produced no value".to_string()))?
            .to_string()
            .map_err(|err| SandboxError::Runtime(err.to_string()))?;
        let shaped: ShapedResult = serde_json::from_str(&shaped_json)
            .map_err(|err| SandboxError::Runtime(format!("result decode failed: {err}")))?;

        let logs: Vec<String> = ctx
            .eval("globalThis.__sandbox_logs")
            .map_err(|err| SandboxError::Runtime(err.to_string()))?;

        Ok(SandboxOutcome {
            result: shaped.value,
            logs,
            time_ms: 0,
            stringified: shaped.stringified,
        })
    })
}

fn classify_eval_error(
    ctx: &Ctx<'_>,
    error: rquickjs::Error,
    deadline: Instant,
    timeout_ms: u64,
) -> SandboxError {
    // An interrupt fired mid-execution also surfaces as an exception;
    // the deadline decides which error the caller sees.
    if Instant::now() >= deadline {
        return SandboxError::Timeout { timeout_ms };
    }
    if matches!(error, rquickjs::Error::Exception) {
        let thrown = ctx.catch();
        if let Some(object) = thrown.as_object() {
            let code: Option<String> = object.get::<_, Option<String>>("code").ok().flatten();
            let message: Option<String> = object.get::<_, Option<String>>("message").ok().flatten();
            let detail = message.unwrap_or_else(|| "unknown error".to_string());
            if code.as_deref() == Some("forbidden_api") {
                return SandboxError::ForbiddenApi { detail };
            }
            return SandboxError::Runtime(detail);
        }
        if let Some(text) = thrown.as_string().and_then(|s| s.to_string().ok()) {
            return SandboxError::Runtime(text);
        }
        return SandboxError::Runtime("uncaught non-error value".to_string());
    }
    SandboxError::Runtime(error.to_string())
}
