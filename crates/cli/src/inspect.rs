use std::path::Path;

use notary_checker::StoreKind;
use notary_core::{HoldingIdentity, SecureHash, StateRef};
use notary_storage::{BackingStore, InMemoryBackingStore};
use serde_json::{json, Value};

use crate::{fail, load_config, open_journal, runtime};

/// Print one JSON object per requested state ref, then one per requested
/// transaction id.
///
/// These are committed, out-of-transaction reads: fine for diagnostics,
/// possibly stale by the time they are printed.
pub fn cmd_inspect(
    config_path: &Path,
    x500_name: &str,
    group: &str,
    transactions: &[String],
    state_refs: &[String],
) {
    let config = load_config(config_path);
    let holding_identity = HoldingIdentity::new(x500_name, group);

    let refs: Vec<StateRef> = state_refs
        .iter()
        .map(|s| s.parse::<StateRef>())
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| fail(e));
    let tx_ids: Vec<SecureHash> = transactions
        .iter()
        .map(|s| s.parse::<SecureHash>())
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| fail(e));

    let rt = runtime();
    let lines = rt.block_on(async {
        match config.store.kind {
            StoreKind::Memory => {
                describe(&InMemoryBackingStore::new(), &holding_identity, &refs, &tx_ids).await
            }
            StoreKind::Journal => {
                let store = open_journal(&config).await;
                describe(&store, &holding_identity, &refs, &tx_ids).await
            }
        }
    });

    for line in lines.unwrap_or_else(|e| fail(e)) {
        println!("{}", line);
    }
}

async fn describe<S: BackingStore>(
    store: &S,
    holding_identity: &HoldingIdentity,
    refs: &[StateRef],
    tx_ids: &[SecureHash],
) -> Result<Vec<Value>, String> {
    let session = store.session(holding_identity);
    let states = session
        .get_state_details(refs)
        .await
        .map_err(|e| e.to_string())?;
    let transactions = session
        .get_transaction_details(tx_ids)
        .await
        .map_err(|e| e.to_string())?;

    let mut lines = Vec::with_capacity(refs.len() + tx_ids.len());
    for state_ref in refs {
        let line = match states.get(state_ref) {
            None => json!({ "state_ref": state_ref, "status": "unknown" }),
            Some(details) => match details.consuming_tx_id {
                None => json!({ "state_ref": state_ref, "status": "unconsumed" }),
                Some(consumer) => json!({
                    "state_ref": state_ref,
                    "status": "consumed",
                    "consuming_tx_id": consumer,
                }),
            },
        };
        lines.push(line);
    }
    for tx_id in tx_ids {
        let line = match transactions.get(tx_id) {
            None => json!({ "tx_id": tx_id, "status": "unknown" }),
            Some(details) => json!({
                "tx_id": tx_id,
                "request_digest": details.request_digest,
                "result": details.result,
            }),
        };
        lines.push(line);
    }
    Ok(lines)
}
