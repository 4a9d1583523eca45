use k3s_cli::{embedded_bundle, logging, Action, Dispatcher, InvocationTarget};
use k3s_data::{AssetStager, DataDirContext, Environment};
use k3s_etcd::LocalEtcd;
use std::ffi::OsString;
use std::process::ExitCode;

fn main() -> ExitCode {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let target = match InvocationTarget::from_args(&argv) {
        Ok(target) => target,
        Err(err) => err.exit(),
    };

    if let Err(err) = logging::init(&target.log_options()) {
        eprintln!("k3s: {err:#}");
    }

    let action = {
        let dispatcher = Dispatcher::new(
            AssetStager::new(embedded_bundle()),
            DataDirContext::from_process(),
            Environment::from_process(),
            LocalEtcd,
        );
        dispatcher.run(target)
    };

    match action {
        Ok(Action::Exec(request)) => {
            let program = request.program.clone();
            let err = request.exec();
            eprintln!("k3s: failed to exec {}: {err}", program.display());
            ExitCode::FAILURE
        }
        Ok(Action::Done) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("k3s: {err:#}");
            ExitCode::FAILURE
        }
    }
}
