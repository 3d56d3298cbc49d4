#[cfg(not(feature = "replay"))]
fn main() {
    eprintln!("Build with --features replay to enable the replay tool.");
}

#[cfg(feature = "replay")]
mod replay {
    use serde::{Deserialize, Serialize};
    use std::env;
    use std::fs;
    use surety_core::bank::Balances;
    use surety_core::config::GenesisConfig;
    use surety_core::error::SuretyError;
    use surety_core::event::{BlockContext, LedgerEvent};
    use surety_core::oracle::FixedIndexSource;
    use surety_core::surety::{Receipt, Surety, Transaction};
    use tracing::info;

    #[derive(Deserialize)]
    struct Line {
        block: BlockContext,
        tx: Transaction,
    }

    // Rendered through `serde_json::to_string` so u128 amounts stream as plain numbers.
    #[derive(Serialize)]
    struct Committed<'a> {
        line: usize,
        call: &'a str,
        first_seq: u64,
        events: &'a [LedgerEvent],
        outcome: String,
    }

    #[derive(Serialize)]
    struct Reverted<'a> {
        line: usize,
        call: &'a str,
        reverted: &'static str,
        reason: String,
    }

    #[derive(Serialize)]
    struct Summary {
        committed: usize,
        reverted: usize,
        entries: usize,
        merkle_root: String,
    }

    pub(crate) fn committed_line(line: usize, call: &str, receipt: &Receipt) -> Result<String, String> {
        serde_json::to_string(&Committed {
            line,
            call,
            first_seq: receipt.first_seq,
            events: &receipt.events,
            outcome: format!("{:?}", receipt.outcome),
        })
        .map_err(|e| format!("line {line}: encode receipt: {e}"))
    }

    pub(crate) fn reverted_line(line: usize, call: &str, err: &SuretyError) -> Result<String, String> {
        serde_json::to_string(&Reverted {
            line,
            call,
            reverted: err.kind().code(),
            reason: err.to_string(),
        })
        .map_err(|e| format!("line {line}: encode rejection: {e}"))
    }

    pub(crate) fn run() -> Result<(), String> {
        let mut genesis_path: Option<String> = None;
        let mut txs_path: Option<String> = None;
        let mut fixed_index: Option<u8> = None;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--genesis" => genesis_path = args.next(),
                "--txs" => txs_path = args.next(),
                "--fixed-index" => {
                    let raw = args.next().ok_or("missing value for --fixed-index")?;
                    fixed_index = Some(raw.parse().map_err(|e| format!("bad --fixed-index: {e}"))?);
                }
                _ => return Err(format!("unknown arg {arg}")),
            }
        }

        let genesis_path = genesis_path.ok_or("missing --genesis")?;
        let txs_path = txs_path.ok_or("missing --txs")?;

        let config = GenesisConfig::load(&genesis_path).map_err(|e| e.to_string())?;
        let genesis = config.genesis().map_err(|e| e.to_string())?;
        let bank = Balances::with_balances(genesis.balances.iter().copied());
        let mut surety = Surety::new(config.surety.clone(), &genesis, bank).map_err(|e| e.to_string())?;
        if let Some(index) = fixed_index {
            surety = surety.with_index_source(FixedIndexSource(index));
        }

        let raw = fs::read_to_string(&txs_path).map_err(|e| format!("read {txs_path}: {e}"))?;
        let (mut committed, mut reverted) = (0usize, 0usize);
        for (n, text) in raw.lines().enumerate() {
            let text = text.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let line: Line =
                serde_json::from_str(text).map_err(|e| format!("line {}: {e}", n + 1))?;
            let call = line.tx.call.name();
            let out = match surety.execute(line.block, line.tx) {
                Ok(receipt) => {
                    committed += 1;
                    committed_line(n + 1, call, &receipt)?
                }
                Err(e) => {
                    reverted += 1;
                    reverted_line(n + 1, call, &e)?
                }
            };
            println!("{out}");
        }

        let log = surety.log();
        log.verify_chain()
            .map_err(|e| format!("event log failed verification: {e:?}"))?;
        let root = log.merkle_root().map(hex::encode).unwrap_or_default();
        info!(committed, reverted, entries = log.len(), %root, "replay finished");
        let summary = Summary {
            committed,
            reverted,
            entries: log.len(),
            merkle_root: root,
        };
        println!(
            "{}",
            serde_json::to_string(&summary).map_err(|e| format!("encode summary: {e}"))?
        );
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use surety_core::config::{Genesis, SuretyConfig};
        use surety_core::event::ETHER;
        use surety_core::surety::Call;

        #[test]
        fn receipts_above_u64_range_render() {
            let airline = [0x10; 32];
            let genesis = Genesis {
                owner: [0x01; 32],
                first_airline: airline,
                balances: Vec::new(),
            };
            let bank = Balances::with_balances([(airline, 50 * ETHER)]);
            let mut s = Surety::new(SuretyConfig::default(), &genesis, bank).unwrap();
            let stake = 20 * ETHER;
            assert!(stake > u128::from(u64::MAX));

            let tx = Transaction::new(airline, Call::FundAirline { airline }).with_value(stake);
            let receipt = s.execute(BlockContext::default(), tx).unwrap();
            let out = committed_line(1, "fund_airline", &receipt).unwrap();
            assert!(out.contains("\"amount\":20000000000000000000"), "{out}");
            assert!(out.contains("\"total_stake\":20000000000000000000"), "{out}");
        }

        #[test]
        fn rejections_render_code_and_reason() {
            let err = SuretyError::InsufficientStake {
                provided: 5 * ETHER,
                required: 10 * ETHER,
            };
            let out = reverted_line(3, "fund_airline", &err).unwrap();
            assert!(out.contains("\"reverted\":\"PRECONDITION\""), "{out}");
            assert!(out.contains("\"line\":3"), "{out}");
        }
    }
}

#[cfg(feature = "replay")]
fn main() -> std::process::ExitCode {
    use std::process::ExitCode;
    use tracing::error;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match replay::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
