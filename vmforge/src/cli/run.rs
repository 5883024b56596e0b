//! Subcommand dispatch: wires real collaborators and maps results to
//! exit codes. 0 on success, 1 when any VM or job failed.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::VirshBackend;
use crate::batch::{BatchMode, BatchOrchestrator, BatchSpec, PipelineJobRunner};
use crate::bootstrap::KnifeBootstrap;
use crate::config::HostConfig;
use crate::errors::ForgeResult;
use crate::logging::JobLogger;
use crate::ops::{self, DeleteOptions};
use crate::provision::Provisioner;
use crate::transfer::{FileTransferClient, LocalTransfer, ScpTransfer};

use super::{Cli, Command, CreateArgs, DeleteArgs, ListArgs, StartArgs, VmCommand};

pub async fn run(cli: Cli, logger: Arc<JobLogger>) -> ForgeResult<i32> {
    match cli.command {
        Command::Vm(VmCommand::Create(args)) => create(args, logger).await,
        Command::Vm(VmCommand::Delete(args)) => delete(args, logger).await,
        Command::Vm(VmCommand::List(args)) => list(args, logger).await,
        Command::Vm(VmCommand::Start(args)) => start(args, logger).await,
    }
}

async fn create(args: CreateArgs, logger: Arc<JobLogger>) -> ForgeResult<i32> {
    if let Some(batch_file) = &args.batch {
        let spec = BatchSpec::load(batch_file)?;
        let mode = if args.concurrent {
            BatchMode::Concurrent
        } else {
            BatchMode::Sequential
        };
        let orchestrator = BatchOrchestrator::new(Arc::clone(&logger), args.max_parallel);
        let runner = Arc::new(PipelineJobRunner::new(logger));
        let results = orchestrator.run_batch(spec, mode, runner).await;
        return Ok(if results.iter().all(|r| r.is_success()) {
            0
        } else {
            1
        });
    }

    let host = args.host.to_config();
    let spec = args.to_spec()?;
    let opts = args.pipeline_options();
    let deadline = args.ssh_timeout.map(Duration::from_secs);

    let provisioner = Provisioner::new(
        Arc::new(VirshBackend::new(&host)),
        transfer_client(&host),
        Arc::new(KnifeBootstrap),
        Arc::clone(&logger),
    );
    let outcome = provisioner.provision_within(spec, opts, deadline).await?;
    logger.info(&outcome.summary());
    Ok(if outcome.is_success() { 0 } else { 1 })
}

async fn delete(args: DeleteArgs, logger: Arc<JobLogger>) -> ForgeResult<i32> {
    let host = args.host.to_config();
    let backend = VirshBackend::new(&host);
    let opts = DeleteOptions {
        force: args.force_delete,
        shutdown_first: args.shutdown_first,
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
    };
    ops::delete_vms(&backend, &logger, &args.names, &opts, &|name| {
        prompt_confirm("delete", name)
    })
    .await?;
    Ok(0)
}

async fn list(args: ListArgs, logger: Arc<JobLogger>) -> ForgeResult<i32> {
    let host = args.host.to_config();
    let backend = VirshBackend::new(&host);
    if args.json {
        ops::list_vms_json(&backend, &logger).await?;
    } else {
        ops::list_vms(&backend, &logger).await?;
    }
    Ok(0)
}

async fn start(args: StartArgs, logger: Arc<JobLogger>) -> ForgeResult<i32> {
    let host = args.host.to_config();
    let backend = VirshBackend::new(&host);
    ops::start_vms(&backend, &logger, &args.names, args.force_start, &|name| {
        prompt_confirm("start", name)
    })
    .await?;
    Ok(0)
}

fn transfer_client(host: &HostConfig) -> Arc<dyn FileTransferClient> {
    if host.is_local() {
        Arc::new(LocalTransfer)
    } else {
        Arc::new(ScpTransfer::new(host))
    }
}

/// Interactive yes/no prompt. Anything but `y`/`yes` declines.
fn prompt_confirm(action: &str, name: &str) -> bool {
    print!("Do you really want to {action} '{name}'? (Y/N) ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
