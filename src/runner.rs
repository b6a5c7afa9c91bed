//! Process entry point shared by the module binaries.
//!
//! A binary is invoked as `<module> <args-file>`. It parses the args file,
//! opens a vCenter session, runs the module, prints one JSON outcome on
//! stdout and exits 0 (success) or 1 (failure). Ctrl-C cancels any task
//! wait in progress.

use crate::outcome::ModuleOutcome;
use crate::params::{ConnectionParams, RawParams};

use async_trait::async_trait;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use vsm_vsphere::task::TaskWaiter;
use vsm_vsphere::{VmwareError, VmwareResult, VsphereApi, VsphereService};

/// An automation module: typed parameters in, one outcome out.
#[async_trait]
pub trait AutomationModule: Sized + Send + Sync {
    const NAME: &'static str;

    fn from_params(raw: RawParams) -> VmwareResult<Self>;

    fn connection(&self) -> &ConnectionParams;

    async fn run(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome>;
}

/// Run a module against an already connected API. Errors become a failed
/// outcome.
pub async fn run_module<M: AutomationModule>(
    module: &M,
    api: &dyn VsphereApi,
    waiter: &TaskWaiter,
) -> ModuleOutcome {
    match module.run(api, waiter).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{} failed: {e}", M::NAME);
            ModuleOutcome::failure(&e)
        }
    }
}

async fn load<M: AutomationModule>(args_path: &Path) -> VmwareResult<M> {
    let text = tokio::fs::read_to_string(args_path).await.map_err(|e| {
        VmwareError::invalid_param(format!("cannot read args file {}: {e}", args_path.display()))
    })?;
    M::from_params(RawParams::parse(&text)?)
}

/// Parse `args_path`, connect and run.
pub async fn execute<M: AutomationModule>(args_path: &Path, cancel: CancellationToken) -> ModuleOutcome {
    let module = match load::<M>(args_path).await {
        Ok(m) => m,
        Err(e) => {
            log::error!("{}: {e}", M::NAME);
            return ModuleOutcome::failure(&e);
        }
    };

    let config = module.connection().to_config();
    let service = match VsphereService::connect(&config).await {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}: {e}", M::NAME);
            return ModuleOutcome::failure(&e);
        }
    };
    let waiter = TaskWaiter::from_config(&config, cancel);
    let outcome = run_module(&module, &service, &waiter).await;
    service.disconnect().await;
    outcome
}

/// `main` body for a module binary.
pub fn main_for<M: AutomationModule>() -> ExitCode {
    crate::logging::init();

    let outcome = match std::env::args_os().nth(1) {
        None => ModuleOutcome::failure(&VmwareError::invalid_param(format!(
            "usage: {} <args-file>",
            M::NAME
        ))),
        Some(path) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt.block_on(async {
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        log::warn!("Interrupted, cancelling task wait");
                        on_signal.cancel();
                    }
                });
                execute::<M>(Path::new(&path), cancel).await
            }),
            Err(e) => ModuleOutcome::failure(&VmwareError::new(
                vsm_vsphere::VmwareErrorKind::Other,
                format!("cannot start runtime: {e}"),
            )),
        },
    };

    println!("{}", outcome.to_json());
    if outcome.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
