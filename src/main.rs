use std::{env, io::Write, process::ExitCode, sync::LazyLock};

use {
    anyhow::Context,
    jiff::{Zoned, civil},
};

mod args;
mod cmd;
mod logger;
mod recur;
mod style;

/// The current civil time, used as the start of a sequence when none is
/// given.
static NOW: LazyLock<civil::DateTime> = LazyLock::new(|| {
    match read_env_recur_now() {
        Ok(Some(dt)) => {
            log::trace!(
                "setting current time to `{dt}` from `RECUR_NOW` \
                 environment variable",
            );
            dt
        }
        Ok(None) => {
            let now = Zoned::now().datetime();
            log::trace!(
                "`RECUR_NOW` environment variable not set, using \
                 current time `{now}`",
            );
            now
        }
        Err(err) => {
            let now = Zoned::now().datetime();
            log::warn!(
                "reading `RECUR_NOW` failed, using current time \
                 `{now}`: {err:#}",
            );
            now
        }
    }
});

fn main() -> ExitCode {
    let Err(err) = run() else { return ExitCode::SUCCESS };
    let root = err.root_cause();
    if root.is::<args::Help>() || root.is::<args::Version>() {
        writeln!(std::io::stdout(), "{root}").unwrap();
        return ExitCode::SUCCESS;
    }
    // Stopping early, as in `recur seq daily | head`, closes stdout.
    let closed = err.chain().any(|cause| {
        cause.downcast_ref::<std::io::Error>().is_some_and(|err| {
            err.kind() == std::io::ErrorKind::BrokenPipe
        })
    });
    if closed {
        return ExitCode::SUCCESS;
    }
    if env::var_os("RUST_BACKTRACE").is_some_and(|v| v == "1") {
        writeln!(std::io::stderr(), "{err:?}").unwrap();
    } else {
        writeln!(std::io::stderr(), "{err:#}").unwrap();
    }
    ExitCode::FAILURE
}

fn run() -> anyhow::Result<()> {
    let log = env::var("RECUR_LOG").unwrap_or_default();
    logger::init(&log)?;
    cmd::run(&mut lexopt::Parser::from_env())
}

fn read_env_recur_now() -> anyhow::Result<Option<civil::DateTime>> {
    let Some(val) = std::env::var_os("RECUR_NOW") else { return Ok(None) };
    let Some(val) = val.to_str() else {
        anyhow::bail!(
            "`RECUR_NOW` environment variable is not valid UTF-8: {val:?}"
        )
    };
    val.parse::<civil::DateTime>()
        .context("`RECUR_NOW` environment variable is not a valid datetime")
        .map(Some)
}
