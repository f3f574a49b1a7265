use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use notary_checker::{
    respond, CheckerConfig, Ed25519ResultSigner, ResultSigner, StoreKind, UniquenessChecker,
};
use notary_core::{CheckRequestMessage, CheckResponse, SecureHash};
use notary_storage::{BackingStore, InMemoryBackingStore};
use tracing::{info, warn};

use crate::{fail, load_config, open_journal, runtime};

/// Check every request in a JSON-lines file and print one `CheckResponse`
/// JSON object per request, in file order.
///
/// Blank lines are skipped. A line that is not a request object stops the
/// run before anything is checked.
pub fn cmd_check(config_path: &Path, requests_path: &Path, key_path: Option<&Path>) {
    let config = load_config(config_path);
    let messages = read_messages(requests_path).unwrap_or_else(|e| fail(e));

    let signer = match key_path {
        Some(path) => {
            Ed25519ResultSigner::from_secret_file(path).unwrap_or_else(|e| fail(e))
        }
        None => {
            let signer = Ed25519ResultSigner::generate();
            warn!(
                public_key = %signer.public_key_base64(),
                "no --key given; signing with an ephemeral key"
            );
            signer
        }
    };

    let rt = runtime();
    let responses = rt.block_on(async {
        match config.store.kind {
            StoreKind::Memory => {
                run_check(InMemoryBackingStore::new(), config.clone(), &messages, &signer).await
            }
            StoreKind::Journal => {
                let store = open_journal(&config).await;
                run_check(store, config.clone(), &messages, &signer).await
            }
        }
    });
    let responses = responses.unwrap_or_else(|e| fail(e));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for response in &responses {
        let line = serde_json::to_string(response).unwrap_or_else(|e| fail(e));
        if let Err(e) = writeln!(out, "{}", line) {
            fail(format!("writing output: {}", e));
        }
    }
}

fn read_messages(path: &Path) -> Result<Vec<CheckRequestMessage>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading '{}': {}", path.display(), e))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<CheckRequestMessage>(line)
                .map_err(|e| format!("{}:{}: invalid request: {}", path.display(), i + 1, e))
        })
        .collect()
}

async fn run_check<S: BackingStore>(
    store: S,
    config: CheckerConfig,
    messages: &[CheckRequestMessage],
    signer: &dyn ResultSigner,
) -> Result<Vec<CheckResponse>, String> {
    let checker = UniquenessChecker::new(Arc::new(store), config);
    let results = checker
        .process_messages(messages)
        .await
        .map_err(|e| e.to_string())?;

    let mut responses = Vec::with_capacity(results.len());
    for (message, result) in messages.iter().zip(results) {
        let response = match message.tx_id.parse::<SecureHash>() {
            Ok(tx_id) => respond(signer, &tx_id, result).map_err(|e| e.to_string())?,
            // Only failures end up here, and failures are never signed.
            Err(_) => CheckResponse {
                result,
                signature: None,
            },
        };
        responses.push(response);
    }

    let accepted = responses.iter().filter(|r| r.result.is_success()).count();
    info!(
        requests = responses.len(),
        accepted,
        rejected = responses.len() - accepted,
        "check finished"
    );
    Ok(responses)
}
