mod common;

use std::path::PathBuf;

use bot_2048::capture::{CaptureError, CellSource, ScreenshotFile};
use bot_2048::config::BotConfig;
use bot_2048::engine::Move;
use bot_2048::input::{Command, KeyEcho, KeyMap};
use bot_2048::policy::Greedy;
use bot_2048::runner::{RunConfig, Runner, Termination};
use bot_2048::trace;
use bot_2048::vision::{CellGrid, LibraryOptions, ReferenceLibrary, TileClassifier};
use common::{board, render, write_library};

const PAIR: &str = "0,0,0,0/0,0,0,0/0,0,2,2/0,0,0,0";
const STUCK: &str = "2,4,2,4/4,2,4,2/2,4,2,4/4,2,4,2";

fn classifier(dir: &std::path::Path) -> TileClassifier {
    write_library(dir);
    TileClassifier::new(ReferenceLibrary::load(dir, &LibraryOptions::default()).unwrap())
}

// Serves a different screenshot on each capture by rewriting one file.
struct Slideshow {
    file: ScreenshotFile,
    path: PathBuf,
    frames: std::vec::IntoIter<&'static str>,
}

impl CellSource for Slideshow {
    fn capture(&mut self) -> Result<CellGrid, CaptureError> {
        let frame = self.frames.next().ok_or(CaptureError::Exhausted)?;
        render(&board(frame)).save(&self.path).unwrap();
        self.file.capture()
    }
}

#[test]
fn screenshot_to_key_press() {
    let lib_dir = tempfile::tempdir().unwrap();
    let shots = tempfile::tempdir().unwrap();
    let classifier = classifier(lib_dir.path());

    let shot = shots.path().join("board.png");
    render(&board(PAIR)).save(&shot).unwrap();

    let read = classifier.read_board(&ScreenshotFile::new(&shot, 4).capture().unwrap());
    assert_eq!(read, board(PAIR));

    let cfg = RunConfig { max_moves: 1, ..RunConfig::default() };
    let mut runner = Runner::new(
        ScreenshotFile::new(&shot, 4),
        KeyEcho::new(Vec::new(), KeyMap::default()),
        classifier,
        Greedy::new(),
        cfg,
    );
    let summary = runner.run().unwrap();
    assert_eq!(summary.termination, Termination::MoveLimit);

    // the chosen slide merges the pair into a single 4
    let after = board(PAIR).shift(Move::Left);
    assert_eq!((after.tile_count(), after.highest_tile(), after.tile_sum()), (1, 4, 4));

    let (_, echo) = runner.into_parts();
    assert_eq!(String::from_utf8(echo.into_inner()).unwrap(), "left\n");
}

#[test]
fn stuck_screen_is_undone_then_play_resumes() {
    let lib_dir = tempfile::tempdir().unwrap();
    let shots = tempfile::tempdir().unwrap();
    let path = shots.path().join("board.png");
    let source = Slideshow {
        file: ScreenshotFile::new(&path, 4),
        path: path.clone(),
        frames: vec![STUCK, PAIR].into_iter(),
    };

    let cfg = BotConfig { max_moves: 1, ..BotConfig::default() };
    let keys = KeyMap { undo: "ctrl+z".into(), ..KeyMap::default() };
    let mut runner = Runner::new(
        source,
        KeyEcho::new(Vec::new(), keys),
        classifier(lib_dir.path()),
        Greedy::with_config(cfg.policy_config()),
        cfg.run_config(),
    )
    .with_trace();

    let summary = runner.run().unwrap();
    assert_eq!(summary.undos, 1);
    assert_eq!(summary.moves, 1);
    assert_eq!(summary.captures, 2);

    let run = summary.trace.unwrap();
    let tmp = shots.path().join("session.trace");
    trace::write_to_path(&tmp, &run).unwrap();
    let back = trace::read_from_path(&tmp).unwrap();
    assert_eq!(back.steps.iter().map(|s| s.command).collect::<Vec<_>>(), vec![Command::Undo, Command::Left]);
    assert_eq!(back.steps[0].board, board(STUCK).values());

    let (_, echo) = runner.into_parts();
    assert_eq!(String::from_utf8(echo.into_inner()).unwrap(), "ctrl+z\nleft\n");
}

#[test]
fn debug_cells_are_written_per_capture() {
    let lib_dir = tempfile::tempdir().unwrap();
    let shots = tempfile::tempdir().unwrap();
    let shot = shots.path().join("board.png");
    render(&board(PAIR)).save(&shot).unwrap();

    let cells = shots.path().join("cells");
    let mut runner = Runner::new(
        ScreenshotFile::new(&shot, 4),
        Vec::<Command>::new(),
        classifier(lib_dir.path()),
        Greedy::new(),
        RunConfig { max_moves: 2, ..RunConfig::default() },
    )
    .with_debug_sink(bot_2048::capture::DebugSink::new(&cells).unwrap());
    runner.run().unwrap();

    assert!(cells.join("cell_2_3_0.png").is_file());
    assert!(cells.join("cell_0_0_1.png").is_file());
    assert_eq!(std::fs::read_dir(&cells).unwrap().count(), 32);
}
