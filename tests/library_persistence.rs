use downbeat::codec::{decode, encode, share_link, unique_show_name, LaunchLink};
use downbeat::db::{LEGACY_SONGS_KEY, SHOWS_KEY};
use downbeat::view_state::ViewScreen;
use downbeat::{ensure_schema, RecordStore, Show, ShowLibrary, Song, ViewState, ViewStateStore};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> RecordStore {
    RecordStore::new(ensure_schema(&dir.path().join("downbeat.sqlite")).unwrap())
}

fn set_a() -> Show {
    let mut show = Show::new("Set A").unwrap();
    show.songs.push(Song::new("Intro", 100).unwrap());
    show.songs.push(Song::new("Outro", 140).unwrap());
    show
}

#[test]
fn edits_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    {
        let mut library = ShowLibrary::open(open_store(&dir)).unwrap();
        let show = library.add(set_a()).unwrap();
        library.update(show, "Friday Gig").unwrap();
        library
            .add_song(show, Song::new("Encore", 160).unwrap())
            .unwrap();
        library.move_song(show, 2, 0).unwrap();
        library.remove_song(show, 2).unwrap();
    }

    let library = ShowLibrary::open(open_store(&dir)).unwrap();
    let show = &library.list()[1];
    assert_eq!(show.name, "Friday Gig");
    let names: Vec<_> = show.songs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Encore", "Intro"]);
}

#[test]
fn corrupt_payload_falls_back_to_seed() {
    let dir = TempDir::new().unwrap();
    open_store(&dir).put(SHOWS_KEY, "not even close").unwrap();

    let library = ShowLibrary::open(open_store(&dir)).unwrap();
    assert_eq!(library.len(), 1);
    let show = &library.list()[0];
    assert_eq!(show.name, "My Show");
    assert_eq!(show.songs, vec![Song::new("My First Song", 120).unwrap()]);
}

#[test]
fn legacy_migration_runs_once_across_launches() {
    let dir = TempDir::new().unwrap();
    open_store(&dir)
        .put(LEGACY_SONGS_KEY, r#"[{"name":"Intro","bpm":100}]"#)
        .unwrap();

    let first = ShowLibrary::open(open_store(&dir)).unwrap().list().to_vec();
    let second = ShowLibrary::open(open_store(&dir)).unwrap().list().to_vec();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "Default Show");
    assert_eq!(open_store(&dir).get(LEGACY_SONGS_KEY).unwrap(), None);
}

#[test]
fn shared_show_imports_under_a_unique_name() {
    let dir = TempDir::new().unwrap();
    let mut library = ShowLibrary::open(open_store(&dir)).unwrap();
    library.add(set_a()).unwrap();

    let link = share_link("https://downbeat.app/", &set_a()).unwrap();
    let mut launch = LaunchLink::new(Some(link));
    let incoming = launch.take_import().unwrap().unwrap();
    assert!(launch.take_import().is_none());

    assert_eq!(
        unique_show_name(library.list(), &incoming.name),
        "Set A (2)"
    );
    library.add(Show::new("Set A (2)").unwrap()).unwrap();
    let name = unique_show_name(library.list(), &incoming.name);
    assert_eq!(name, "Set A (3)");

    let index = library
        .add(Show {
            name,
            songs: incoming.songs,
        })
        .unwrap();
    assert_eq!(library.list()[index].songs, set_a().songs);
}

#[test]
fn share_token_round_trips_through_decode() {
    let token = encode(&set_a()).unwrap();
    assert_eq!(decode(&token).unwrap(), set_a());
    assert!(decode("%%%").is_err());
}

#[test]
fn view_state_resumes_after_reopen() {
    let dir = TempDir::new().unwrap();
    let mut library = ShowLibrary::open(open_store(&dir)).unwrap();
    let show = library.add(set_a()).unwrap();
    ViewStateStore::new(open_store(&dir))
        .save(&ViewState::playback(show, 1))
        .unwrap();

    let mut views = ViewStateStore::new(open_store(&dir));
    let target = views.begin_restore(&library);
    assert_eq!(target.screen, ViewScreen::Playback);
    assert_eq!(target.show_index, Some(show));
    assert_eq!(target.song_index, 1);
    views.finish_restore();

    library.remove(show).unwrap();
    let mut views = ViewStateStore::new(open_store(&dir));
    assert_eq!(views.begin_restore(&library), ViewState::library());
}
