//! Everything a plugin binary needs: implement [`PluginHandler`], then
//! `wi_plugin_sdk::plugin_main!(MyHandler::default());`.

use std::env;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use wi_core::EnqueuedCommands;
pub use wi_core::rpc::{
    EditorDetails, Host, INTERFACE_FINGERPRINT, PLUGIN_ENV, PLUGIN_ENV_VALUE, PluginDetails,
    PluginHandler, RemoteEvent, RpcError,
};

/// Environment variable holding the plugin's log filter.
pub const LOG_ENV: &str = "WI_LOG";

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("this is a wi plugin; it must be started by the wi editor")]
    NotPluginMode,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}

/// Whether the editor started this process. `marker` is the value of
/// [`PLUGIN_ENV`].
pub fn check_mode(marker: Option<&str>) -> Result<(), SdkError> {
    match marker {
        Some(PLUGIN_ENV_VALUE) => Ok(()),
        _ => Err(SdkError::NotPluginMode),
    }
}

/// Run `handler` over stdin/stdout until the editor says quit. Returns the
/// process exit code.
pub fn run<H: PluginHandler>(mut handler: H) -> i32 {
    let marker = env::var(PLUGIN_ENV).ok();
    if let Err(e) = check_mode(marker.as_deref()) {
        eprintln!("{e}");
        return 1;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("can't start runtime: {e}");
            return 1;
        }
    };
    let result = runtime.block_on(serve_stdio(&mut handler));
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "plugin stopped");
            1
        }
    }
}

async fn serve_stdio<H: PluginHandler>(handler: &mut H) -> Result<(), SdkError> {
    let mut stdout = tokio::io::stdout();
    handshake(&mut stdout).await?;
    // Anything on stderr before the token counts as a failed start.
    init_tracing();
    info!("connected to editor");
    wi_core::rpc::serve(handler, tokio::io::stdin(), stdout).await?;
    Ok(())
}

/// Write the version token the editor checks before the first frame.
pub async fn handshake<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    writer.write_all(INTERFACE_FINGERPRINT.as_bytes()).await?;
    writer.flush().await
}

/// Handshake then serve on an arbitrary transport.
pub async fn serve_on<H, R, W>(handler: &mut H, reader: R, mut writer: W) -> Result<(), SdkError>
where
    H: PluginHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    handshake(&mut writer).await?;
    wi_core::rpc::serve(handler, reader, writer).await?;
    Ok(())
}

// The editor re-logs every stderr line under the plugin's name.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Generate `main` for a plugin binary.
#[macro_export]
macro_rules! plugin_main {
    ($handler:expr) => {
        fn main() {
            std::process::exit($crate::run($handler));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};
    use wi_core::rpc::{Call, Message, Reply, read_message, write_message};

    #[test]
    fn test_mode_check() {
        assert!(check_mode(Some("plugin")).is_ok());
        assert!(matches!(check_mode(None), Err(SdkError::NotPluginMode)));
        assert!(matches!(check_mode(Some("1")), Err(SdkError::NotPluginMode)));
    }

    struct Named;

    impl PluginHandler for Named {
        fn get_info(&mut self, language: &str) -> PluginDetails {
            PluginDetails {
                name: format!("named-{language}"),
                version: "1.0".to_string(),
            }
        }

        fn init(&mut self, _editor: &EditorDetails, _host: &Host) -> Result<(), String> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_token_precedes_frames() {
        let (editor, plugin) = duplex(4096);
        let (plugin_read, plugin_write) = tokio::io::split(plugin);
        let (mut editor_read, mut editor_write) = tokio::io::split(editor);

        let server = tokio::spawn(async move {
            let mut handler = Named;
            serve_on(&mut handler, plugin_read, plugin_write).await
        });

        let mut token = vec![0u8; INTERFACE_FINGERPRINT.len()];
        editor_read.read_exact(&mut token).await.unwrap();
        assert_eq!(token, INTERFACE_FINGERPRINT.as_bytes());

        let call = Message::Request {
            id: 1,
            call: Call::GetInfo {
                language: "fr".to_string(),
            },
        };
        write_message(&mut editor_write, &call).await.unwrap();
        match read_message(&mut editor_read).await.unwrap() {
            Some(Message::Response { id: 1, result: Ok(Reply::Info(details)) }) => {
                assert_eq!(details.name, "named-fr");
            }
            other => panic!("unexpected {other:?}"),
        }

        write_message(&mut editor_write, &Message::Request { id: 2, call: Call::Quit { code: 0 } })
            .await
            .unwrap();
        assert!(matches!(
            read_message(&mut editor_read).await.unwrap(),
            Some(Message::Response { id: 2, result: Ok(Reply::Done) })
        ));
        server.await.unwrap().unwrap();
    }
}
