//! `VirtService` backed by the `virsh` command-line client.
//!
//! Each operation is one `virsh` invocation against the configured
//! connection URI. Failures carry virsh's stderr verbatim.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use virtnet_core::error::{NetError, Result};
use virtnet_core::VirtnetConfig;

use crate::codec;
use crate::service::{NetworkHandle, VirtService};

/// Runtime state fields reported by `virsh net-info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetInfo {
    pub active: bool,
    pub autostart: bool,
}

/// `virsh` driver.
#[derive(Debug, Clone)]
pub struct VirshService {
    binary: PathBuf,
    connect_uri: Option<String>,
}

impl VirshService {
    pub fn new(binary: impl Into<PathBuf>, connect_uri: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            connect_uri,
        }
    }

    pub fn from_config(config: &VirtnetConfig) -> Self {
        Self::new(config.virsh_path.clone(), config.connect_uri.clone())
    }

    fn base_args(&self) -> Vec<String> {
        match &self.connect_uri {
            Some(uri) => vec!["-c".to_string(), uri.clone()],
            None => Vec::new(),
        }
    }

    /// Run `virsh <args>` and return stdout, or stderr as the error.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.base_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(binary = %self.binary.display(), ?args, "Running virsh");

        let output = cmd.output().await.map_err(|e| {
            NetError::External(format!(
                "failed to run {}: {} (is libvirt-clients installed?)",
                self.binary.display(),
                e
            ))
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("virsh {} exited with {}", args.join(" "), output.status)
        } else {
            stderr
        };
        Err(NetError::External(message))
    }

    async fn net_info(&self, net: &NetworkHandle) -> Result<NetInfo> {
        let out = self.run(&["net-info", net.uuid()]).await?;
        Ok(parse_net_info(&out))
    }
}

#[async_trait]
impl VirtService for VirshService {
    async fn uri(&self) -> Result<String> {
        Ok(self.run(&["uri"]).await?.trim().to_string())
    }

    async fn define_network(&self, xml: &str) -> Result<NetworkHandle> {
        let name = codec::decode(xml)?.name;

        let mut file = tempfile::Builder::new()
            .prefix("virtnet-")
            .suffix(".xml")
            .tempfile()?;
        file.write_all(xml.as_bytes())?;
        file.flush()?;

        let path = file.path().to_string_lossy().into_owned();
        self.run(&["net-define", &path]).await?;

        let uuid = self.run(&["net-uuid", &name]).await?.trim().to_string();
        if uuid.is_empty() {
            return Err(NetError::External(format!(
                "virsh reported no uuid for network '{}'",
                name
            )));
        }
        Ok(NetworkHandle::new(uuid))
    }

    async fn lookup_by_uuid(&self, uuid: &str) -> Result<NetworkHandle> {
        self.run(&["net-name", uuid]).await.map_err(lookup_error)?;
        Ok(NetworkHandle::new(uuid))
    }

    async fn activate(&self, net: &NetworkHandle) -> Result<()> {
        match self.run(&["net-start", net.uuid()]).await {
            Err(NetError::External(msg)) if is_already_active(&msg) => {
                tracing::debug!(uuid = %net, "Network already active");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    async fn deactivate(&self, net: &NetworkHandle) -> Result<()> {
        self.run(&["net-destroy", net.uuid()]).await.map(|_| ())
    }

    async fn undefine(&self, net: &NetworkHandle) -> Result<()> {
        self.run(&["net-undefine", net.uuid()]).await.map(|_| ())
    }

    async fn is_active(&self, net: &NetworkHandle) -> Result<bool> {
        Ok(self.net_info(net).await?.active)
    }

    async fn get_autostart(&self, net: &NetworkHandle) -> Result<bool> {
        Ok(self.net_info(net).await?.autostart)
    }

    async fn set_autostart(&self, net: &NetworkHandle, autostart: bool) -> Result<()> {
        let mut args = vec!["net-autostart", net.uuid()];
        if !autostart {
            args.push("--disable");
        }
        self.run(&args).await.map(|_| ())
    }

    async fn xml_desc(&self, net: &NetworkHandle) -> Result<String> {
        self.run(&["net-dumpxml", net.uuid()]).await
    }
}

/// Parse `virsh net-info` output (`Key:   value` lines).
pub fn parse_net_info(output: &str) -> NetInfo {
    let mut info = NetInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let yes = value.trim().eq_ignore_ascii_case("yes");
        match key.trim() {
            "Active" => info.active = yes,
            "Autostart" => info.autostart = yes,
            _ => {}
        }
    }
    info
}

/// Lookups report a missing network as `NotFound`; every other command keeps
/// the failure `External`.
fn lookup_error(err: NetError) -> NetError {
    match err {
        NetError::External(msg) if is_not_found_message(&msg) => NetError::NotFound(msg),
        other => other,
    }
}

fn is_not_found_message(stderr: &str) -> bool {
    stderr.contains("Network not found") || stderr.contains("no network with matching")
}

fn is_already_active(stderr: &str) -> bool {
    stderr.contains("already active")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_INFO: &str = "Name:           k8snet
UUID:           8d6ac1b6-0b3c-4d6a-9a36-3c1f2a9a1d11
Active:         yes
Persistent:     yes
Autostart:      no
Bridge:         virbr1
";

    #[test]
    fn test_parse_net_info() {
        let info = parse_net_info(NET_INFO);
        assert!(info.active);
        assert!(!info.autostart);
    }

    #[test]
    fn test_parse_net_info_empty() {
        assert_eq!(parse_net_info(""), NetInfo::default());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found_message(
            "error: failed to get network '8d6a'\nerror: Network not found: no network with matching uuid '8d6a'"
        ));
        assert!(!is_not_found_message("error: failed to connect to the hypervisor"));
    }

    #[test]
    fn test_lookup_error_mapping() {
        let missing = NetError::External(
            "error: Network not found: no network with matching uuid '8d6a'".to_string(),
        );
        assert!(lookup_error(missing).is_not_found());

        let refused = NetError::External("error: failed to connect to the hypervisor".to_string());
        assert!(matches!(lookup_error(refused), NetError::External(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_network_outside_lookup_stays_external() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("virsh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"error: Network not found: no network with matching uuid '$2'\" >&2\nexit 1\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let service = VirshService::new(script.clone(), None);
        let net = NetworkHandle::new("8d6a");
        assert!(matches!(
            service.undefine(&net).await,
            Err(NetError::External(msg)) if msg.contains("Network not found")
        ));
        assert!(service.lookup_by_uuid("8d6a").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_already_active_detection() {
        assert!(is_already_active(
            "error: Failed to start network k8snet\nerror: Requested operation is not valid: network is already active"
        ));
        assert!(!is_already_active("error: Failed to start network k8snet"));
    }

    #[test]
    fn test_base_args() {
        let local = VirshService::new("virsh", None);
        assert!(local.base_args().is_empty());

        let remote = VirshService::new("virsh", Some("qemu:///system".to_string()));
        assert_eq!(remote.base_args(), vec!["-c", "qemu:///system"]);
    }

    #[test]
    fn test_from_config() {
        let config = VirtnetConfig {
            connect_uri: Some("qemu:///session".to_string()),
            ..Default::default()
        };
        let service = VirshService::from_config(&config);
        assert_eq!(service.binary, PathBuf::from("virsh"));
        assert_eq!(service.connect_uri.as_deref(), Some("qemu:///session"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_external_error() {
        let service = VirshService::new("/nonexistent/virtnet-virsh", None);
        match service.uri().await {
            Err(NetError::External(msg)) => assert!(msg.contains("libvirt-clients")),
            other => panic!("expected external error, got {other:?}"),
        }
    }
}
