use std::time::Duration;

use downbeat::playback::{BeatScheduler, ClockScheduler, ManualClock, PlaybackEngine};
use downbeat::{ensure_schema, RecordStore, Show, ShowLibrary, Song, TransportState};
use tempfile::TempDir;

fn open_library(dir: &TempDir) -> ShowLibrary {
    let conn = ensure_schema(&dir.path().join("downbeat.sqlite")).unwrap();
    ShowLibrary::open(RecordStore::new(conn)).unwrap()
}

fn set_a() -> Show {
    let mut show = Show::new("Set A").unwrap();
    show.songs.push(Song::new("Intro", 100).unwrap());
    show.songs.push(Song::new("Outro", 140).unwrap());
    show
}

#[test]
fn transport_walk_through_set_a() {
    let dir = TempDir::new().unwrap();
    let mut library = open_library(&dir);
    let show = library.add(set_a()).unwrap();

    let clock = ManualClock::new();
    let mut engine = PlaybackEngine::new(ClockScheduler::new(clock.clone()));

    engine.enter(&library, show, 0).unwrap();
    engine.start();
    assert_eq!(engine.state(), TransportState::Running);
    assert_eq!(engine.live_bpm(), Some(100));

    for _ in 0..5 {
        assert!(engine.tempo_up());
    }
    assert_eq!(engine.live_bpm(), Some(105));
    assert_eq!(engine.state(), TransportState::Running);

    assert!(engine.next(&library).unwrap());
    let session = engine.session().unwrap();
    assert_eq!(session.song_index, 1);
    assert_eq!(session.live_bpm, 140);
    assert_eq!(engine.state(), TransportState::Running);
    assert_eq!(engine.scheduler().active_signals(), 1);

    assert_eq!(engine.commit_tempo(&mut library).unwrap(), 140);
    assert_eq!(library.song(show, 1).unwrap().bpm, 140);

    assert!(engine.previous(&library).unwrap());
    assert_eq!(engine.live_bpm(), Some(100));
    for _ in 0..10 {
        engine.tempo_down();
    }
    assert_eq!(engine.commit_tempo(&mut library).unwrap(), 90);
    drop(library);

    let reopened = open_library(&dir);
    assert_eq!(reopened.song(show, 0).unwrap().bpm, 90);
    assert_eq!(reopened.song(show, 1).unwrap().bpm, 140);

    clock.advance(Duration::from_millis(10));
    assert!(engine.pulse().is_some());
}

#[test]
fn track_navigation_stops_at_the_edges() {
    let dir = TempDir::new().unwrap();
    let mut library = open_library(&dir);
    let show = library.add(set_a()).unwrap();
    let mut engine = PlaybackEngine::new(ClockScheduler::new(ManualClock::new()));

    engine.enter(&library, show, 0).unwrap();
    assert!(!engine.previous(&library).unwrap());
    assert!(engine.next(&library).unwrap());
    assert!(!engine.next(&library).unwrap());
    assert_eq!(engine.session().unwrap().song_index, 1);
    assert_eq!(engine.state(), TransportState::Stopped);
    assert_eq!(engine.scheduler().active_signals(), 0);
}

#[test]
fn repeated_start_stop_keeps_one_signal() {
    let dir = TempDir::new().unwrap();
    let mut library = open_library(&dir);
    let show = library.add(set_a()).unwrap();
    let mut engine = PlaybackEngine::new(ClockScheduler::new(ManualClock::new()));

    engine.enter(&library, show, 1).unwrap();
    for _ in 0..3 {
        engine.start();
        engine.start();
        assert_eq!(engine.scheduler().active_signals(), 1);
        engine.stop();
        assert_eq!(engine.scheduler().active_signals(), 0);
    }
    engine.toggle();
    assert_eq!(engine.scheduler().active_signals(), 1);

    engine.exit();
    assert_eq!(engine.scheduler().active_signals(), 0);
    assert!(engine.session().is_none());
    assert!(engine.pulse().is_none());
}

#[test]
fn empty_show_cannot_be_played() {
    let dir = TempDir::new().unwrap();
    let mut library = open_library(&dir);
    let show = library.add(Show::new("Empty").unwrap()).unwrap();
    let mut engine = PlaybackEngine::new(ClockScheduler::new(ManualClock::new()));

    assert!(engine.enter(&library, show, 0).is_err());
    assert!(engine.session().is_none());
}
