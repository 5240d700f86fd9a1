//! Slide Blocks headless runner
//!
//! Plays one level of a pack from a scripted list of taps and logs the
//! simulation events.
//!
//! Usage: `slide-blocks [pack.json] [level] [script]`
//!
//! The script is a comma-separated list of `block@seconds` taps, or `auto`
//! to tap every block in order. Without a level index the stored progress is
//! used and advanced on a win.

#[cfg(not(target_arch = "wasm32"))]
mod runner {
    use std::path::Path;

    use slide_blocks::LevelPack;
    use slide_blocks::consts::{MAX_SUBSTEPS, SIM_DT};
    use slide_blocks::persistence::{JsonFileStore, LevelSession};
    use slide_blocks::sim::{EntityId, Level, Outcome, SimEvent, TickInput, tick};

    const DEMO_PACK: &str = include_str!("../demos/levels.json");
    const PROGRESS_FILE: &str = "slide_blocks_progress.json";
    /// Simulated frame length the runner feeds into the fixed-step loop
    const FRAME_SECS: f32 = 1.0 / 60.0;
    const MAX_RUN_SECS: f64 = 60.0;
    const AUTO_TAP_SPACING: f64 = 1.5;

    #[derive(Debug, Clone, Copy)]
    struct Tap {
        block: EntityId,
        at: f64,
    }

    fn parse_script(script: &str, blocks: &[EntityId]) -> Result<Vec<Tap>, String> {
        if script == "auto" {
            return Ok(blocks
                .iter()
                .enumerate()
                .map(|(i, &block)| Tap {
                    block,
                    at: i as f64 * AUTO_TAP_SPACING,
                })
                .collect());
        }
        let mut taps = script
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|entry| {
                let (block, at) = entry
                    .trim()
                    .split_once('@')
                    .ok_or_else(|| format!("expected block@seconds, got '{entry}'"))?;
                let block = block
                    .parse::<EntityId>()
                    .map_err(|e| format!("bad block id '{block}': {e}"))?;
                let at = at
                    .parse::<f64>()
                    .map_err(|e| format!("bad time '{at}': {e}"))?;
                Ok(Tap { block, at })
            })
            .collect::<Result<Vec<_>, String>>()?;
        taps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(taps)
    }

    fn log_event(event: &SimEvent) {
        match event {
            SimEvent::Won => log::info!("Level won"),
            SimEvent::Lost { reason } => log::info!("Level lost: {reason:?}"),
            SimEvent::LowMoves { remaining } => log::warn!("Only {remaining} moves left"),
            other => log::debug!("{other:?}"),
        }
    }

    /// Drive the level with a frame accumulator until it resolves
    fn play(level: &mut Level, taps: &[Tap]) -> Option<Outcome> {
        let mut pending = taps.iter().peekable();
        let mut accumulator = 0.0f32;
        while !level.is_resolved() && level.time() < MAX_RUN_SECS {
            accumulator += FRAME_SECS;
            let mut substeps = 0;
            while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let mut input = TickInput::default();
                while let Some(tap) = pending.next_if(|t| t.at <= level.time()) {
                    input.activations.push(tap.block);
                }
                tick(level, &input, SIM_DT);
                for event in level.drain_events() {
                    log_event(&event);
                }
                accumulator -= SIM_DT;
                substeps += 1;
            }
        }
        level.outcome()
    }

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let pack = match args.first().map(String::as_str) {
            Some(path) if path != "-" => {
                LevelPack::load(Path::new(path)).map_err(|e| e.to_string())?
            }
            _ => LevelPack::from_json(DEMO_PACK).map_err(|e| e.to_string())?,
        };

        let store = JsonFileStore::open(Path::new(PROGRESS_FILE)).map_err(|e| e.to_string())?;
        let mut session: Option<LevelSession<JsonFileStore>> = None;
        let index = match args.get(1) {
            Some(index) => index
                .parse::<usize>()
                .map_err(|e| format!("bad level index '{index}': {e}"))?,
            None => {
                let resumed = LevelSession::load(store, &pack.name, &pack);
                let index = resumed.current();
                session = Some(resumed);
                index
            }
        };

        let blocks = pack.block_ids(index).map_err(|e| e.to_string())?;
        let script = args.get(2).map(String::as_str).unwrap_or("auto");
        let taps = parse_script(script, &blocks)?;

        let mut level = pack.build(index).map_err(|e| e.to_string())?;
        log::info!(
            "Playing level {index} of '{}' with {} taps",
            pack.name,
            taps.len()
        );
        let outcome = play(&mut level, &taps);
        log::info!(
            "Finished at t={:.2}s after {} ticks: {:?}, collected {}/{}",
            level.time(),
            level.time_ticks,
            outcome,
            level.collected(),
            level.collection_needed()
        );

        if outcome == Some(Outcome::Won) {
            if let Some(session) = session.as_mut() {
                let next = session.advance().map_err(|e| e.to_string())?;
                log::info!("Progress saved to {PROGRESS_FILE}, next level {next}");
            }
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_script_sorts_taps() {
            let taps = parse_script("2@1.5, 1@0", &[1, 2]).unwrap();
            assert_eq!(taps.len(), 2);
            assert_eq!(taps[0].block, 1);
            assert_eq!(taps[1].at, 1.5);
        }

        #[test]
        fn test_auto_script_taps_every_block() {
            let taps = parse_script("auto", &[1, 2, 3]).unwrap();
            assert_eq!(taps.len(), 3);
            assert_eq!(taps[2].at, 2.0 * AUTO_TAP_SPACING);
        }

        #[test]
        fn test_parse_script_rejects_garbage() {
            assert!(parse_script("1-0", &[1]).is_err());
            assert!(parse_script("x@0", &[1]).is_err());
        }

        #[test]
        fn test_demo_pack_builds_every_level() {
            let pack = LevelPack::from_json(DEMO_PACK).unwrap();
            for index in 0..pack.levels.len() {
                assert!(pack.build(index).is_ok());
            }
        }

        #[test]
        fn test_first_demo_level_resolves() {
            let pack = LevelPack::from_json(DEMO_PACK).unwrap();
            let mut level = pack.build(0).unwrap();
            let taps = parse_script("auto", &pack.block_ids(0).unwrap()).unwrap();
            assert_eq!(play(&mut level, &taps), Some(Outcome::Won));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Slide Blocks (headless) starting...");
    if let Err(e) = runner::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
