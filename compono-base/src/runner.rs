use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use compono::{
    Application, ApplicationIo, ApplicationMode, Context, Driver, DriverOptions,
    ERROR_EXIT_CODE, Error, JoinedError, OptionValue, catch,
};

use crate::cancel_on_signal;

/// Runs `app` with the process arguments and streams.
pub async fn run<A>(app: A, mode: ApplicationMode) -> ExitCode
where
    A: Application,
{
    run_with_context(&Context::new(), app, mode).await
}

/// Runs `app` under `ctx` with the process arguments and streams.
///
/// An error left unhandled by the application is rendered to the error
/// output. Exit codes outside `0..=255` become [`ERROR_EXIT_CODE`].
pub async fn run_with_context<A>(ctx: &Context, app: A, mode: ApplicationMode) -> ExitCode
where
    A: Application,
{
    let io = Arc::new(ApplicationIo::std());
    let driver = Driver::new(DriverOptions {
        io: Some(io.clone()),
        args: std::env::args().skip(1).collect(),
    });
    let (exit_code, error) = driver.run_application(ctx, app, mode).await;
    if let Some(error) = error {
        let message = match catch(|| render_error(error.as_ref())) {
            Ok(v) => v,
            Err(err) => format!("panic during rendering the original error: {err}\n"),
        };
        if let Err(err) = io.error_output().write_all(message.as_bytes()) {
            tracing::error!("Cannot write unhandled error: {err}");
        }
    }
    ExitCode::from(u8::try_from(exit_code).unwrap_or(ERROR_EXIT_CODE as u8))
}

/// Runs `app` and cancels its context on SIGINT or SIGTERM.
///
/// # Examples
///
/// ```rust,no_run
/// use compono::{ApplicationMode, QuickApplication};
/// use std::process::ExitCode;
///
/// #[tokio::main]
/// async fn main() -> ExitCode {
///     let app = QuickApplication::new("hello").with_action(|_env, _args| Ok(0));
///     compono_base::run_gracefully(app, ApplicationMode::Production).await
/// }
/// ```
pub async fn run_gracefully<A>(app: A, mode: ApplicationMode) -> ExitCode
where
    A: Application,
{
    let ctx = Context::new();
    let signals = tokio::spawn(cancel_on_signal(ctx.clone()));
    let exit_code = run_with_context(&ctx, app, mode).await;
    ctx.cancel();
    if let Err(err) = signals.await {
        tracing::warn!("Shutdown signal listener failed: {err}");
    }
    exit_code
}

/// Renders an unhandled error as plain text.
///
/// The output lists every error with its causes, followed by the
/// diagnostic options collected from the whole chain.
pub fn render_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "> An unhandled error has occurred in the application.");
    let _ = writeln!(text, "Details:");
    let mut options = Vec::new();
    render_details(&mut text, &mut options, err, 0);
    if options.is_empty() {
        return text;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (key, _) in &options {
        *counts.entry(*key).or_default() += 1;
    }
    let has_duplicates = counts.values().any(|v| *v > 1);
    let _ = writeln!(text, "Options:");
    for (i, (key, value)) in options.iter().enumerate() {
        if has_duplicates && let Some(count) = counts.get_mut(key) {
            *count -= 1;
            let _ = writeln!(text, "{}. {key} ({count}) => {value}", i + 1);
        } else {
            let _ = writeln!(text, "{}. {key} => {value}", i + 1);
        }
    }
    text
}

fn render_details<'a>(
    text: &mut String,
    options: &mut Vec<(&'static str, &'a OptionValue)>,
    err: &'a (dyn std::error::Error + 'static),
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    if let Some(joined) = err.downcast_ref::<JoinedError>() {
        for (i, err) in joined.errors().iter().enumerate() {
            let _ = writeln!(text, "{indent}[{}]", i + 1);
            render_details(text, options, err.as_ref(), depth + 1);
        }
        return;
    }
    let _ = writeln!(text, "{indent}{err}");
    collect_options(options, err);
    let mut source = err.source();
    while let Some(current) = source {
        if current.is::<JoinedError>() {
            render_details(text, options, current, depth + 1);
            return;
        }
        let _ = writeln!(text, "{indent}caused by: {current}");
        collect_options(options, current);
        source = current.source();
    }
}

fn collect_options<'a>(
    options: &mut Vec<(&'static str, &'a OptionValue)>,
    err: &'a (dyn std::error::Error + 'static),
) {
    if let Some(err) = err.downcast_ref::<Error>() {
        options.extend(err.options().iter().map(|(k, v)| (*k, v)));
    }
}
