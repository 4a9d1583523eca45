use crate::exec::ExecRequest;
use crate::invocation::{ExternalTarget, InProcessCommand, InvocationTarget};
use crate::snapshot;
use anyhow::Context;
use k3s_data::{
    prepare_environment, AssetBundleSource, AssetStager, DataDirContext, Environment,
    CRI_CONFIG_FILE_ENV, DEFAULT_DATA_DIR,
};
use k3s_etcd::ClusterManager;
use std::path::{Path, PathBuf};

/// What `main` does once every lock and temporary directory has been released.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Exec(ExecRequest),
    Done,
}

/// Routes an [`InvocationTarget`] to staging plus exec, or to an in-process handler.
pub struct Dispatcher<B, M> {
    stager: AssetStager<B>,
    data_dirs: DataDirContext,
    env: Environment,
    cluster: M,
}

impl<B: AssetBundleSource, M: ClusterManager> Dispatcher<B, M> {
    pub fn new(
        stager: AssetStager<B>,
        data_dirs: DataDirContext,
        mut env: Environment,
        cluster: M,
    ) -> Self {
        env.set_default(CRI_CONFIG_FILE_ENV, default_crictl_config());
        Self {
            stager,
            data_dirs,
            env,
            cluster,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn run(&self, target: InvocationTarget) -> anyhow::Result<Action> {
        match target {
            InvocationTarget::External(target) => self.stage_and_exec(target).map(Action::Exec),
            InvocationTarget::InProcess(InProcessCommand::EtcdSnapshot(options)) => {
                let (data_root, _) = self.stage(options.data_dir.as_deref())?;
                snapshot::run(&self.cluster, &data_root, &options)?;
                Ok(Action::Done)
            }
        }
    }

    /// Stages the bundle under the data root named by `data_dir` and returns that root with
    /// the environment the staged tools expect.
    fn stage(&self, data_dir: Option<&Path>) -> anyhow::Result<(PathBuf, Environment)> {
        let data_root = self.data_dirs.resolve(data_dir)?;
        let dir = self
            .stager
            .resolve(&data_root)
            .context("extracting data")?;
        tracing::debug!(target: "k3s.cli", dir = %dir.display(), "asset dir");

        let mut env = self.env.clone();
        prepare_environment(&mut env, &dir)?;
        Ok((data_root, env))
    }

    fn stage_and_exec(&self, target: ExternalTarget) -> anyhow::Result<ExecRequest> {
        let (_, env) = self.stage(target.data_dir.as_deref())?;
        let program = env.lookup_executable(&target.executable)?;
        tracing::debug!(
            target: "k3s.cli",
            program = %program.display(),
            args = ?target.args,
            "running"
        );

        Ok(ExecRequest {
            program,
            arg0: target.arg0,
            args: target.args,
            env,
        })
    }
}

fn default_crictl_config() -> PathBuf {
    Path::new(DEFAULT_DATA_DIR)
        .join("agent")
        .join("etc")
        .join("crictl.yaml")
}
