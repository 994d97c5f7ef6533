use crate::store::{PersistenceStore, RecordKey, StoreError};
use common::messages::{Outcome, Report, View};
use common::{parse_column, Column, GameState, InputError, MoveError, PlayError, Scores, Turn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub type SharedService<S> = Arc<GameService<S>>;

// Everything that changes between requests. Only touched while the lock is held.
#[derive(Debug)]
struct Live {
    game_state: GameState,
    scores: Scores,
}

#[derive(Debug)]
pub struct GameService<S: PersistenceStore> {
    store: S,
    live: Mutex<Live>,
}

impl<S: PersistenceStore> GameService<S> {
    // Starts with a fresh game and the stored scores. Scores that are missing
    // or corrupt start again from zero and are written back.
    pub fn open(store: S) -> Self {
        let loaded = match store.load::<Scores>(RecordKey::Scores) {
            Ok(scores) => scores,
            // The record may still be intact, so leave it for the next start
            Err(err @ StoreError::Unavailable { .. }) => {
                warn!("could not read scores, counting from zero: {}", err);
                Some(Scores::new())
            }
            Err(err) => {
                warn!("could not load scores, starting from zero: {}", err);
                None
            }
        };
        let scores = match loaded {
            Some(scores) => scores,
            None => {
                let scores = Scores::new();
                if let Err(err) = store.save(RecordKey::Scores, &scores) {
                    warn!("could not write initial scores: {}", err);
                }
                scores
            }
        };
        info!(
            player1 = scores.player1,
            player2 = scores.player2,
            "game service ready"
        );
        GameService {
            store,
            live: Mutex::new(Live {
                game_state: GameState::new(),
                scores,
            }),
        }
    }

    // Every mutation finishes before any I/O that could fail, so a poisoned
    // lock still guards a consistent state
    fn lock(&self) -> MutexGuard<'_, Live> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view_of(&self, live: &Live) -> View {
        View::new(
            &live.game_state,
            live.scores,
            self.store.exists(RecordKey::Game),
        )
    }

    pub fn view(&self) -> View {
        let live = self.lock();
        self.view_of(&live)
    }

    pub fn scores(&self) -> Scores {
        self.lock().scores
    }

    // For a shell that shows the message once: both steps under one lock, so a
    // message set by a concurrent request is never dropped unseen
    pub fn view_and_clear_message(&self) -> View {
        let mut live = self.lock();
        let view = self.view_of(&live);
        live.game_state.clear_message();
        view
    }

    // Throws away the current game. The reset always happens; a failure to
    // delete the saved game is returned so the caller can report it.
    #[tracing::instrument(skip(self))]
    pub fn new_game(&self) -> Result<View, StoreError> {
        let mut live = self.lock();
        live.game_state = GameState::new();
        info!("started a new game");
        self.store.delete(RecordKey::Game).map_err(|err| {
            warn!("failed to delete saved game: {}", err);
            err
        })?;
        Ok(self.view_of(&live))
    }

    // Replaces the live game with the saved one, if there is a usable save.
    // Otherwise the live game is left alone.
    #[tracing::instrument(skip(self))]
    pub fn resume(&self) -> Report {
        let mut live = self.lock();
        let outcome = match self.store.load::<GameState>(RecordKey::Game) {
            Ok(Some(game_state)) if game_state.status().is_over() => {
                warn!("saved game is already finished, discarding it");
                self.discard_save();
                Outcome::NothingToResume
            }
            Ok(Some(mut game_state)) => {
                game_state.set_message(Outcome::Resumed.to_string());
                live.game_state = game_state;
                info!("resumed saved game");
                Outcome::Resumed
            }
            Ok(None) => {
                debug!("no saved game to resume");
                Outcome::NothingToResume
            }
            Err(err @ StoreError::Corrupt { .. }) => {
                warn!("discarding unusable saved game: {}", err);
                self.discard_save();
                Outcome::NothingToResume
            }
            Err(err) => {
                warn!("could not read saved game: {}", err);
                Outcome::NothingToResume
            }
        };
        Report {
            outcome,
            view: self.view_of(&live),
        }
    }

    // Writes the live game to storage. A finished game is never saved, since
    // there would be nothing left to resume.
    #[tracing::instrument(skip(self))]
    pub fn save(&self) -> Result<View, StoreError> {
        let mut live = self.lock();
        if live.game_state.status().is_over() {
            live.game_state.set_message(Outcome::GameOver.to_string());
            return Ok(self.view_of(&live));
        }
        self.store
            .save(RecordKey::Game, &live.game_state)
            .map_err(|err| {
                warn!("failed to save game: {}", err);
                err
            })?;
        live.game_state.set_message(Outcome::Saved.to_string());
        info!("saved game");
        Ok(self.view_of(&live))
    }

    pub fn play(&self, col: i64) -> Report {
        self.apply(Column::new(col))
    }

    // Same as play for unparsed input such as a form field.
    pub fn play_input(&self, text: &str) -> Report {
        self.apply(parse_column(text))
    }

    #[tracing::instrument(skip(self))]
    fn apply(&self, input: Result<Column, InputError>) -> Report {
        let mut live = self.lock();
        let outcome = match input {
            Err(_) if live.game_state.status().is_over() => Outcome::GameOver,
            Err(err) => {
                debug!("rejected move: {}", err);
                Outcome::InvalidColumn
            }
            Ok(col) => match live.game_state.play(col) {
                Ok(Turn::Placed { .. }) => Outcome::Placed,
                Ok(Turn::Won(player)) => {
                    live.scores.record_win(player);
                    if let Err(err) = self.store.save(RecordKey::Scores, &live.scores) {
                        warn!("failed to save scores: {}", err);
                    }
                    self.discard_save();
                    Outcome::Won(player)
                }
                Ok(Turn::Draw) => {
                    self.discard_save();
                    Outcome::Draw
                }
                Err(PlayError::GameOver) => Outcome::GameOver,
                Err(PlayError::Move(MoveError::ColumnFull(_))) => Outcome::ColumnFull,
                Err(PlayError::Move(MoveError::InvalidColumn(_))) => Outcome::InvalidColumn,
            },
        };
        if outcome == Outcome::Placed {
            live.game_state.clear_message();
        } else {
            live.game_state.set_message(outcome.to_string());
        }
        info!(?outcome, "move handled");
        Report {
            outcome,
            view: self.view_of(&live),
        }
    }

    // A finished or unreadable game can't be resumed
    fn discard_save(&self) {
        if let Err(err) = self.store.delete(RecordKey::Game) {
            warn!("failed to delete finished game: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use common::{Player, StatusKind, COLS, ROWS};
    use serde::{de::DeserializeOwned, Serialize};
    use std::fs;
    use std::io;
    use std::thread;
    use tempfile::TempDir;

    const DRAW_MOVES: [i64; 42] = [
        3, 3, 0, 2, 5, 4, 5, 6, 4, 2, 2, 3, 3, 5, 5, 2, 2, 4, 3, 3, 1, 1, 2, 1, 5, 5, 0, 4, 0, 4,
        4, 6, 6, 6, 6, 0, 1, 0, 6, 0, 1, 1,
    ];

    // Storage that is always broken
    #[derive(Debug)]
    struct FailingStore;

    fn broken(path: &str) -> StoreError {
        StoreError::Unavailable {
            path: path.into(),
            source: io::Error::new(io::ErrorKind::Other, "disk on fire"),
        }
    }

    impl PersistenceStore for FailingStore {
        fn save<T: Serialize>(&self, _key: RecordKey, _record: &T) -> Result<(), StoreError> {
            Err(broken("save"))
        }

        fn load<T: DeserializeOwned>(&self, _key: RecordKey) -> Result<Option<T>, StoreError> {
            Err(broken("load"))
        }

        fn delete(&self, _key: RecordKey) -> Result<(), StoreError> {
            Err(broken("delete"))
        }

        fn exists(&self, _key: RecordKey) -> bool {
            false
        }
    }

    // Reads fail but writes would succeed, and every write is counted
    #[derive(Debug, Default)]
    struct UnreadableStore {
        saves: Mutex<Vec<RecordKey>>,
    }

    impl PersistenceStore for UnreadableStore {
        fn save<T: Serialize>(&self, key: RecordKey, _record: &T) -> Result<(), StoreError> {
            self.saves.lock().unwrap().push(key);
            Ok(())
        }

        fn load<T: DeserializeOwned>(&self, _key: RecordKey) -> Result<Option<T>, StoreError> {
            Err(broken("load"))
        }

        fn delete(&self, _key: RecordKey) -> Result<(), StoreError> {
            Ok(())
        }

        fn exists(&self, _key: RecordKey) -> bool {
            true
        }
    }

    fn open_temp() -> (TempDir, GameService<JsonFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let service = GameService::open(JsonFileStore::new(dir.path()));
        (dir, service)
    }

    fn play_all<S: PersistenceStore>(service: &GameService<S>, moves: &[i64]) -> Vec<Outcome> {
        moves.iter().map(|&c| service.play(c).outcome).collect()
    }

    fn stored_scores(dir: &TempDir) -> Scores {
        JsonFileStore::new(dir.path())
            .load(RecordKey::Scores)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_open_writes_initial_scores() {
        let (dir, service) = open_temp();
        assert_eq!(service.scores(), Scores::default());
        assert_eq!(stored_scores(&dir), Scores::default());
        assert!(!service.view().has_resumable_save);
    }

    #[test]
    fn test_open_keeps_existing_scores() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let scores = Scores {
            player1: 3,
            player2: 7,
        };
        store.save(RecordKey::Scores, &scores).unwrap();
        let service = GameService::open(store);
        assert_eq!(service.scores(), scores);
    }

    #[test]
    fn test_open_replaces_corrupt_scores() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.path(RecordKey::Scores), "not json").unwrap();
        let service = GameService::open(store);
        assert_eq!(service.scores(), Scores::default());
        assert_eq!(stored_scores(&dir), Scores::default());
    }

    #[test]
    fn test_open_keeps_unreadable_scores() {
        let service = GameService::open(UnreadableStore::default());
        assert_eq!(service.scores(), Scores::default());
        assert!(service.store.saves.lock().unwrap().is_empty());

        // A later win still records scores as usual
        play_all(&service, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(*service.store.saves.lock().unwrap(), vec![RecordKey::Scores]);
    }

    #[test]
    fn test_view_does_not_mutate() {
        let (_dir, service) = open_temp();
        service.play(2);
        service.play(9);
        let first = service.view();
        let second = service.view();
        assert_eq!(first, second);
        assert_eq!(first.message.as_deref(), Some("Invalid column."));
    }

    #[test]
    fn test_view_and_clear_message() {
        let (_dir, service) = open_temp();
        service.play(9);
        let shown = service.view_and_clear_message();
        assert_eq!(shown.message.as_deref(), Some("Invalid column."));
        assert_eq!(service.view().message, None);
    }

    #[test]
    fn test_valid_move_clears_previous_message() {
        let (_dir, service) = open_temp();
        assert_eq!(service.play(9).view.message.as_deref(), Some("Invalid column."));
        let report = service.play(2);
        assert_eq!(report.outcome, Outcome::Placed);
        assert_eq!(report.view.message, None);

        service.play(0);
        service.save().unwrap();
        let report = service.play(1);
        assert_eq!(report.view.message, None);
    }

    #[test]
    fn test_new_game_is_idempotent_and_keeps_scores() {
        let (_dir, service) = open_temp();
        play_all(&service, &[3, 4, 3, 4, 3, 4, 3]);
        let first = service.new_game().unwrap();
        let second = service.new_game().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.board, common::Board::new());
        assert_eq!(first.current_player, Player::One);
        assert_eq!(first.status, StatusKind::Ongoing);
        assert_eq!(first.scores.player1, 1);
    }

    #[test]
    fn test_new_game_deletes_save() {
        let (_dir, service) = open_temp();
        service.play(0);
        service.save().unwrap();
        assert!(service.view().has_resumable_save);
        let view = service.new_game().unwrap();
        assert!(!view.has_resumable_save);
        assert_eq!(service.resume().outcome, Outcome::NothingToResume);
    }

    #[test]
    fn test_turns_alternate() {
        let (_dir, service) = open_temp();
        let mut expected = Player::One;
        for c in [0, 1, 2, 3, 0, 1, 2, 3] {
            assert_eq!(service.view().current_player, expected);
            assert_eq!(service.play(c).outcome, Outcome::Placed);
            expected = expected.other();
        }
    }

    #[test]
    fn test_vertical_win_updates_scores() {
        let (dir, service) = open_temp();
        service.play(3);
        service.save().unwrap();

        let outcomes = play_all(&service, &[4, 3, 4, 3, 4, 3]);
        assert_eq!(outcomes.last(), Some(&Outcome::Won(Player::One)));
        let view = service.view();
        assert_eq!(view.status, StatusKind::Win);
        assert_eq!(view.winner, 1);
        assert_eq!(view.scores.player1, 1);
        assert_eq!(view.scores.player2, 0);
        assert_eq!(view.message.as_deref(), Some("Congratulations, Player 1!"));
        assert!(!view.has_resumable_save);
        assert_eq!(stored_scores(&dir).player1, 1);
    }

    #[test]
    fn test_out_of_range_column() {
        let (_dir, service) = open_temp();
        service.play(1);
        let before = service.view();
        let report = service.play(COLS as i64);
        assert_eq!(report.outcome, Outcome::InvalidColumn);
        assert_eq!(report.view.board, before.board);
        assert_eq!(report.view.current_player, before.current_player);
        assert_eq!(report.view.last_move, before.last_move);
        assert_eq!(service.play(-1).outcome, Outcome::InvalidColumn);
    }

    #[test]
    fn test_malformed_input() {
        let (_dir, service) = open_temp();
        assert_eq!(service.play_input("left").outcome, Outcome::InvalidColumn);
        assert_eq!(service.play_input("").outcome, Outcome::InvalidColumn);
        let report = service.play_input(" 4 ");
        assert_eq!(report.outcome, Outcome::Placed);
        assert_eq!(report.view.last_move.map(|m| m.col), Some(4));
    }

    #[test]
    fn test_full_column() {
        let (_dir, service) = open_temp();
        play_all(&service, &[5; ROWS]);
        let before = service.view();
        let report = service.play(5);
        assert_eq!(report.outcome, Outcome::ColumnFull);
        assert_eq!(report.view.board, before.board);
        assert_eq!(report.view.current_player, before.current_player);
        assert_eq!(
            report.view.message.as_deref(),
            Some("Column full. Choose another column.")
        );
    }

    #[test]
    fn test_draw() {
        let (dir, service) = open_temp();
        play_all(&service, &DRAW_MOVES[..10]);
        service.save().unwrap();
        let outcomes = play_all(&service, &DRAW_MOVES[10..]);
        assert_eq!(outcomes.last(), Some(&Outcome::Draw));
        let view = service.view();
        assert_eq!(view.status, StatusKind::Draw);
        assert_eq!(view.winner, 0);
        assert_eq!(view.scores, Scores::default());
        assert!(!view.has_resumable_save);
        assert_eq!(stored_scores(&dir), Scores::default());
    }

    #[test]
    fn test_play_after_game_over() {
        let (_dir, service) = open_temp();
        play_all(&service, &[3, 4, 3, 4, 3, 4, 3]);
        let before = service.view();
        assert_eq!(service.play(0).outcome, Outcome::GameOver);
        assert_eq!(service.play_input("x").outcome, Outcome::GameOver);
        let after = service.view();
        assert_eq!(after.board, before.board);
        assert_eq!(after.scores, before.scores);
    }

    #[test]
    fn test_resume_without_save() {
        let (_dir, service) = open_temp();
        service.play(6);
        let before = service.view();
        let report = service.resume();
        assert_eq!(report.outcome, Outcome::NothingToResume);
        assert_eq!(report.view, before);
    }

    #[test]
    fn test_save_and_resume_in_new_service() {
        let dir = tempfile::tempdir().unwrap();
        let service = GameService::open(JsonFileStore::new(dir.path()));
        play_all(&service, &[3, 3, 2, 4]);
        let saved = service.save().unwrap();
        assert_eq!(saved.message.as_deref(), Some("Game saved."));
        assert!(saved.has_resumable_save);
        drop(service);

        let restarted = GameService::open(JsonFileStore::new(dir.path()));
        assert_eq!(restarted.view().board, common::Board::new());
        let report = restarted.resume();
        assert_eq!(report.outcome, Outcome::Resumed);
        let view = report.view;
        assert_eq!(view.board, saved.board);
        assert_eq!(view.current_player, saved.current_player);
        assert_eq!(view.status, saved.status);
        assert_eq!(view.winner, saved.winner);
        assert_eq!(view.last_move, saved.last_move);
        assert_eq!(view.message.as_deref(), Some("Game resumed from save."));
    }

    #[test]
    fn test_resume_corrupt_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.path(RecordKey::Game), "{\"board\": 12}").unwrap();
        let service = GameService::open(store);
        service.play(1);
        let before = service.view();
        let report = service.resume();
        assert_eq!(report.outcome, Outcome::NothingToResume);
        assert_eq!(report.view.board, before.board);
        assert_eq!(report.view.message, before.message);
        assert!(!report.view.has_resumable_save);
        assert!(!dir.path().join("save.json").exists());
    }

    #[test]
    fn test_resume_discards_finished_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut finished = GameState::new();
        for c in [3, 4, 3, 4, 3, 4, 3] {
            finished.play(Column::new(c).unwrap()).unwrap();
        }
        store.save(RecordKey::Game, &finished).unwrap();
        let service = GameService::open(store);
        assert!(service.view().has_resumable_save);
        let report = service.resume();
        assert_eq!(report.outcome, Outcome::NothingToResume);
        assert!(!report.view.has_resumable_save);
        assert_eq!(report.view.board, common::Board::new());
    }

    #[test]
    fn test_finished_game_is_not_saved() {
        let (_dir, service) = open_temp();
        play_all(&service, &[3, 4, 3, 4, 3, 4, 3]);
        let view = service.save().unwrap();
        assert!(!view.has_resumable_save);
        assert_eq!(
            view.message.as_deref(),
            Some("The game is over. Start a new game.")
        );
    }

    #[test]
    fn test_storage_failures_keep_game_playable() {
        let service = GameService::open(FailingStore);
        assert_eq!(service.scores(), Scores::default());
        service.play(0);
        let before = service.view();

        assert!(matches!(service.save(), Err(StoreError::Unavailable { .. })));
        assert_eq!(service.view(), before);
        assert_eq!(service.resume().outcome, Outcome::NothingToResume);
        assert_eq!(service.play(1).outcome, Outcome::Placed);

        // The reset happens even though the old save could not be removed
        assert!(service.new_game().is_err());
        assert_eq!(service.view().board, common::Board::new());

        let outcomes = play_all(&service, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(outcomes.last(), Some(&Outcome::Won(Player::One)));
        assert_eq!(service.scores().player1, 1);
    }

    #[test]
    fn test_concurrent_plays_are_serialized() {
        let (_dir, service) = open_temp();
        let service = Arc::new(service);
        let handles: Vec<_> = (0..COLS as i64)
            .map(|c| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    (0..3)
                        .map(|_| {
                            let _ = service.view();
                            service.play(c).outcome
                        })
                        .collect::<Vec<Outcome>>()
                })
            })
            .collect();
        let outcomes: Vec<Outcome> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let placed = outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Placed | Outcome::Won(_) | Outcome::Draw))
            .count();
        let wins = outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Won(_)))
            .count();
        let view = service.view();
        let ones = view.board.count(Player::One);
        let twos = view.board.count(Player::Two);
        assert_eq!(ones + twos, placed);
        assert!(ones == twos || ones == twos + 1);
        assert!(wins <= 1);
        assert_eq!(
            (view.scores.player1 + view.scores.player2) as usize,
            wins
        );
        assert!(view.board.is_settled());
    }
}
