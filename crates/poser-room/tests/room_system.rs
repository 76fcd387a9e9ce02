//! Integration tests for rooms and the registry, driven through real
//! session channels.

use std::sync::Arc;

use poser_game::Game;
use poser_protocol::{
    GameState, JsonCodec, Notification, PlayerEntry, Role, Seat, ServerMessage,
    Stroke,
};
use poser_room::{Departure, Room, RoomConfig, RoomError, RoomRegistry};
use poser_session::{Outbound, Session, SessionId, SessionReceiver};

// =========================================================================
// Helpers
// =========================================================================

struct Player {
    id: SessionId,
    seat: Seat,
    rx: SessionReceiver,
}

impl Player {
    /// Everything queued for this player so far, decoded.
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut msgs = Vec::new();
        while let Some(item) = self.rx.try_recv() {
            if let Outbound::Frame(frame) = item {
                msgs.push(serde_json::from_slice(&frame).expect("valid frame"));
            }
        }
        msgs
    }
}

fn room_with_seed(seed: u64) -> Room<JsonCodec> {
    Room::with_game(
        "test",
        RoomConfig::default(),
        Arc::new(JsonCodec),
        Game::seeded(seed),
    )
}

async fn join(room: &Room<JsonCodec>, id: &str) -> Player {
    let (session, rx) = Session::with_id(id.into());
    let seat = room.add(session).await.expect("join should succeed");
    Player {
        id: id.into(),
        seat,
        rx,
    }
}

async fn join_n(room: &Room<JsonCodec>, n: usize) -> Vec<Player> {
    let mut players = Vec::new();
    for i in 1..=n {
        players.push(join(room, &format!("conn-{i}")).await);
    }
    players
}

fn drain_all(players: &mut [Player]) {
    for p in players {
        p.drain();
    }
}

/// Seed whose first round over seats 1..=n makes `poser` the Poser.
fn seed_with_poser(n: usize, poser: Seat) -> u64 {
    let seats: Vec<Seat> = (1..=n).map(Seat).collect();
    (0..1000)
        .find(|seed| {
            let mut g = Game::seeded(*seed);
            g.start(&seats).unwrap();
            g.poser() == Some(poser)
        })
        .expect("some seed should match")
}

fn states(msgs: &[ServerMessage]) -> Vec<GameState> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::State(s) => Some(s.state),
            _ => None,
        })
        .collect()
}

fn notifications(msgs: &[ServerMessage]) -> Vec<&Notification> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::Notification(n) => Some(n),
            _ => None,
        })
        .collect()
}

fn errors(msgs: &[ServerMessage]) -> Vec<&str> {
    notifications(msgs)
        .into_iter()
        .filter(|n| n.is_error)
        .map(|n| n.message.as_str())
        .collect()
}

fn role(msgs: &[ServerMessage]) -> Option<Role> {
    msgs.iter().find_map(|m| match m {
        ServerMessage::Role(r) => Some(r.role),
        _ => None,
    })
}

fn prompt(msgs: &[ServerMessage]) -> Option<&str> {
    msgs.iter().find_map(|m| match m {
        ServerMessage::Prompt(p) => Some(p.prompt.as_str()),
        _ => None,
    })
}

/// Plays every drawing turn in order.
async fn draw_until_voting(room: &Room<JsonCodec>) {
    while room.state().await == GameState::Drawing {
        let drawer = room.inspect(|g| g.drawing()).await.unwrap();
        room.end_turn(drawer).await.unwrap();
    }
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_join_takes_lowest_free_seat() {
    let room = room_with_seed(1);
    let players = join_n(&room, 3).await;
    assert_eq!(
        players.iter().map(|p| p.seat).collect::<Vec<_>>(),
        vec![Seat(1), Seat(2), Seat(3)]
    );

    assert_eq!(
        room.remove(&players[1].id).await,
        Departure { remaining: 2, aborted: false }
    );
    assert_eq!(room.seats().await, vec![Seat(1), Seat(3)]);

    let late = join(&room, "conn-late").await;
    assert_eq!(late.seat, Seat(2));
    assert_eq!(room.seat_of(&"conn-late".into()).await, Some(Seat(2)));
}

#[tokio::test]
async fn test_join_full_room_is_refused() {
    let room = Room::with_game(
        "small",
        RoomConfig {
            capacity: 2,
            ..RoomConfig::default()
        },
        Arc::new(JsonCodec),
        Game::seeded(1),
    );
    join_n(&room, 2).await;

    let (extra, _rx) = Session::with_id("conn-3".into());
    assert_eq!(room.add(extra).await, Err(RoomError::RoomFull));
    assert_eq!(room.len().await, 2);
}

#[tokio::test]
async fn test_join_during_round_is_refused() {
    let room = room_with_seed(1);
    join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();

    let (late, _rx) = Session::with_id("conn-late".into());
    assert_eq!(room.add(late).await, Err(RoomError::GameInProgress));
}

#[tokio::test]
async fn test_concurrent_joins_fill_exactly_to_capacity() {
    let room = Arc::new(room_with_seed(1));
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let room = Arc::clone(&room);
            tokio::spawn(async move {
                let (session, _rx) = Session::with_id(format!("conn-{i}").as_str().into());
                room.add(session).await
            })
        })
        .collect();

    let mut seats = Vec::new();
    let mut full = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(seat) => seats.push(seat),
            Err(RoomError::RoomFull) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    seats.sort();
    assert_eq!(seats, (1..=8).map(Seat).collect::<Vec<_>>());
    assert_eq!(full, 12);
}

#[tokio::test]
async fn test_roster_lists_every_slot() {
    let room = room_with_seed(1);
    let players = join_n(&room, 3).await;
    room.remove(&players[1].id).await;

    let roster = room.roster().await;
    assert_eq!(roster.len(), 8);
    assert_eq!(roster[0], PlayerEntry { id: "conn-1".into(), votes: 0 });
    assert_eq!(roster[1].id, "");
    assert_eq!(roster[2].id, "conn-3");
}

// =========================================================================
// Fan-out
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_members_see_rosters_in_join_order() {
    let room = Arc::new(Room::with_game(
        "busy",
        RoomConfig {
            capacity: 64,
            ..RoomConfig::default()
        },
        Arc::new(JsonCodec),
        Game::seeded(1),
    ));
    let mut observer = join(&room, "conn-observer").await;

    let handles: Vec<_> = (0..60)
        .map(|i| {
            let room = Arc::clone(&room);
            tokio::spawn(async move {
                let (session, rx) = Session::with_id(format!("conn-{i}").as_str().into());
                room.add(session).await.unwrap();
                room.broadcast_players().await;
                rx
            })
        })
        .collect();
    let mut receivers = Vec::new();
    for h in handles {
        receivers.push(h.await.unwrap());
    }

    let sizes: Vec<usize> = observer
        .drain()
        .iter()
        .filter_map(|m| match m {
            ServerMessage::Players(p) => {
                Some(p.players.iter().filter(|e| !e.id.is_empty()).count())
            }
            _ => None,
        })
        .collect();
    assert_eq!(sizes.len(), 60);
    assert!(
        sizes.windows(2).all(|w| w[0] <= w[1]),
        "rosters arrived out of order: {sizes:?}"
    );
    assert_eq!(sizes.last(), Some(&61));
}

#[tokio::test]
async fn test_broadcast_skips_the_sender() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;

    let stroke = Stroke {
        last_x: 1.0,
        last_y: 2.0,
        x: 3.0,
        y: 4.0,
        player_number: Seat(2),
    };
    room.broadcast(Some(Seat(2)), ServerMessage::Draw(stroke)).await;

    assert_eq!(players[0].drain(), vec![ServerMessage::Draw(stroke)]);
    assert!(players[1].drain().is_empty());
    assert_eq!(players[2].drain(), vec![ServerMessage::Draw(stroke)]);
}

#[tokio::test]
async fn test_broadcast_raw_relays_bytes_unchanged() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 2).await;
    let frame: &[u8] = br#"{"type":"cursor","data":{"x":1}}"#;

    room.broadcast_raw(Some(Seat(1)), frame).await;

    assert!(players[0].rx.try_recv().is_none());
    assert_eq!(
        players[1].rx.try_recv(),
        Some(Outbound::Frame(Arc::from(frame)))
    );
}

#[tokio::test]
async fn test_send_to_reaches_one_session() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 2).await;
    room.send_to(&"conn-2".into(), ServerMessage::info("hello")).await;

    assert!(players[0].drain().is_empty());
    assert_eq!(notifications(&players[1].drain())[0].message, "hello");
}

// =========================================================================
// Round flow
// =========================================================================

#[tokio::test]
async fn test_only_host_may_start() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;

    let err = room.start(Seat(2)).await.unwrap_err();
    assert!(matches!(err, RoomError::NotPermitted { .. }));
    assert_eq!(room.state().await, GameState::Waiting);

    assert!(players[0].drain().is_empty());
    assert_eq!(errors(&players[1].drain()), vec!["Only Player #1 can start the game"]);
}

#[tokio::test]
async fn test_start_deals_private_roles() {
    let seed = seed_with_poser(4, Seat(3));
    let room = room_with_seed(seed);
    let mut players = join_n(&room, 4).await;
    room.start(Seat(1)).await.unwrap();

    let muse = room.inspect(|g| g.muse()).await.unwrap();
    for p in &mut players {
        let msgs = p.drain();
        assert_eq!(states(&msgs), vec![GameState::GettingPrompt]);
        let expected = if p.seat == muse {
            Role::Muse
        } else if p.seat == Seat(3) {
            Role::Poser
        } else {
            Role::Artist
        };
        assert_eq!(role(&msgs), Some(expected), "seat {}", p.seat);

        let muse_told = notifications(&msgs)
            .iter()
            .any(|n| n.message.starts_with("You are the Muse"));
        assert_eq!(muse_told, p.seat == muse);
    }
}

#[tokio::test]
async fn test_duplicate_start_is_ignored() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();
    drain_all(&mut players);
    let before = room.inspect(|g| g.round().clone()).await;

    let err = room.start(Seat(1)).await.unwrap_err();
    assert!(matches!(err, RoomError::Game(poser_game::GameError::GameInProgress)));
    assert_eq!(room.inspect(|g| g.round().clone()).await, before);
    assert!(players[0].drain().is_empty());
}

#[tokio::test]
async fn test_start_alone_aborts_with_reason() {
    let room = room_with_seed(1);
    let mut host = join(&room, "conn-1").await;

    assert!(room.start(Seat(1)).await.is_err());
    let msgs = host.drain();
    assert_eq!(errors(&msgs), vec!["not enough players: need at least 2, have 1"]);
    assert_eq!(states(&msgs), vec![GameState::Waiting]);
}

#[tokio::test]
async fn test_prompt_from_non_muse_is_refused_privately() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;
    room.start(Seat(1)).await.unwrap();
    drain_all(&mut players);

    let muse = room.inspect(|g| g.muse()).await.unwrap();
    let other = players.iter().position(|p| p.seat != muse).unwrap();
    let seat = players[other].seat;

    assert!(room.set_prompt(seat, "cat").await.is_err());
    assert_eq!(room.state().await, GameState::GettingPrompt);
    assert_eq!(
        errors(&players[other].drain()),
        vec!["Only the Muse can choose the prompt"]
    );
}

#[tokio::test]
async fn test_poser_never_sees_the_prompt() {
    let seed = seed_with_poser(3, Seat(2));
    let room = room_with_seed(seed);
    let mut players = join_n(&room, 3).await;
    room.start(Seat(1)).await.unwrap();
    drain_all(&mut players);
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    let first = room.inspect(|g| g.drawing()).await.unwrap();

    room.set_prompt(muse, "  lighthouse ").await.unwrap();

    for p in &mut players {
        let msgs = p.drain();
        let seen = prompt(&msgs).unwrap();
        if p.seat == Seat(2) {
            assert!(!seen.contains("lighthouse"));
        } else {
            assert_eq!(seen, "lighthouse");
        }
        assert_eq!(states(&msgs), vec![GameState::Drawing]);
        assert!(msgs.contains(&ServerMessage::turn(first)));
    }
}

#[tokio::test]
async fn test_wrong_drawer_aborts_the_round() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;
    room.start(Seat(1)).await.unwrap();
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    room.set_prompt(muse, "cat").await.unwrap();
    drain_all(&mut players);

    let drawer = room.inspect(|g| g.drawing()).await.unwrap();
    let intruder = [Seat(1), Seat(2), Seat(3)]
        .into_iter()
        .find(|s| *s != drawer)
        .unwrap();
    assert!(room.end_turn(intruder).await.is_err());

    assert_eq!(room.state().await, GameState::Waiting);
    for p in &mut players {
        let msgs = p.drain();
        assert_eq!(states(&msgs), vec![GameState::Waiting]);
        assert_eq!(errors(&msgs).len(), 1);
    }
}

#[tokio::test]
async fn test_three_player_round_catching_the_poser() {
    let seed = seed_with_poser(3, Seat(3));
    let room = room_with_seed(seed);
    let mut players = join_n(&room, 3).await;

    room.start(Seat(1)).await.unwrap();
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    room.set_prompt(muse, "cat").await.unwrap();
    drain_all(&mut players);

    let mut turns = 0;
    while room.state().await == GameState::Drawing {
        let drawer = room.inspect(|g| g.drawing()).await.unwrap();
        room.end_turn(drawer).await.unwrap();
        turns += 1;
    }
    assert_eq!(turns, 6);
    assert_eq!(room.state().await, GameState::Voting);
    let msgs = players[0].drain();
    assert!(notifications(&msgs)
        .iter()
        .any(|n| n.message == "Time to vote! Who is the Poser?"));

    room.vote(Seat(1), Seat(3)).await.unwrap();
    room.vote(Seat(2), Seat(3)).await.unwrap();
    drain_all(&mut players);
    room.vote(Seat(3), Seat(1)).await.unwrap();
    assert_eq!(room.state().await, GameState::PoserGuessing);

    let msgs = players[0].drain();
    let votes: Vec<u32> = msgs
        .iter()
        .find_map(|m| match m {
            ServerMessage::Players(p) => Some(p.players.iter().map(|e| e.votes).collect()),
            _ => None,
        })
        .unwrap();
    assert_eq!(&votes[..3], &[1, 0, 2]);
    assert_eq!(states(&msgs), vec![GameState::PoserGuessing]);

    drain_all(&mut players);
    room.guess(Seat(3), "Cat").await.unwrap();
    assert_eq!(room.state().await, GameState::PoserWon);
    let msgs = players[1].drain();
    assert_eq!(states(&msgs), vec![GameState::PoserWon]);
}

#[tokio::test]
async fn test_wrong_guess_ends_with_poser_lost() {
    let seed = seed_with_poser(2, Seat(2));
    let room = room_with_seed(seed);
    let mut players = join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();
    room.set_prompt(Seat(1), "cat").await.unwrap();
    draw_until_voting(&room).await;
    room.vote(Seat(1), Seat(2)).await.unwrap();
    room.vote(Seat(2), Seat(2)).await.unwrap();
    drain_all(&mut players);

    // Only the Poser may guess.
    assert!(room.guess(Seat(1), "cat").await.is_err());
    assert_eq!(room.state().await, GameState::PoserGuessing);

    room.guess(Seat(2), "dog").await.unwrap();
    assert_eq!(room.state().await, GameState::PoserLost);
    let msgs = players[0].drain();
    assert!(notifications(&msgs).iter().any(|n| n.message.contains("The artists win")));
}

#[tokio::test]
async fn test_bad_votes_are_answered_privately() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;
    room.start(Seat(1)).await.unwrap();
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    room.set_prompt(muse, "cat").await.unwrap();
    draw_until_voting(&room).await;

    room.vote(Seat(1), Seat(2)).await.unwrap();
    drain_all(&mut players);

    assert!(room.vote(Seat(1), Seat(3)).await.is_err());
    assert!(room.vote(Seat(2), Seat(7)).await.is_err());
    assert_eq!(room.state().await, GameState::Voting);

    assert_eq!(errors(&players[0].drain()), vec!["player #1 has already voted"]);
    assert_eq!(errors(&players[1].drain()), vec!["invalid vote from #2 for #7"]);
    assert!(players[2].drain().is_empty());
}

#[tokio::test]
async fn test_tie_ends_the_round_for_the_poser() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    room.set_prompt(muse, "cat").await.unwrap();
    draw_until_voting(&room).await;

    room.vote(Seat(1), Seat(2)).await.unwrap();
    room.vote(Seat(2), Seat(1)).await.unwrap();
    assert_eq!(room.state().await, GameState::PoserWonByTie);
    let msgs = players[0].drain();
    assert!(notifications(&msgs).iter().any(|n| n.message.contains("tied")));
}

#[tokio::test]
async fn test_next_round_starts_after_a_finished_one() {
    let room = room_with_seed(1);
    join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();
    let muse = room.inspect(|g| g.muse()).await.unwrap();
    room.set_prompt(muse, "cat").await.unwrap();
    draw_until_voting(&room).await;
    room.vote(Seat(1), Seat(2)).await.unwrap();
    room.vote(Seat(2), Seat(1)).await.unwrap();
    assert!(room.inspect(|g| g.is_finished()).await);

    // Newcomers may take a seat between rounds.
    join(&room, "conn-3").await;
    room.start(Seat(1)).await.unwrap();
    assert_eq!(room.state().await, GameState::GettingPrompt);
    assert_eq!(
        room.inspect(|g| g.seats().to_vec()).await,
        vec![Seat(1), Seat(2), Seat(3)]
    );
}

#[tokio::test]
async fn test_participant_leaving_aborts_the_round() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 3).await;
    room.start(Seat(1)).await.unwrap();
    drain_all(&mut players);

    let gone = players.remove(1);
    assert_eq!(
        room.remove(&gone.id).await,
        Departure { remaining: 2, aborted: true }
    );

    assert_eq!(room.state().await, GameState::Waiting);
    assert_eq!(room.inspect(|g| g.round().clone()).await, poser_game::Round::default());
    for p in &mut players {
        let msgs = p.drain();
        assert_eq!(errors(&msgs), vec!["Player #2 left the game"]);
        assert_eq!(states(&msgs), vec![GameState::Waiting]);
        let rosters = msgs
            .iter()
            .filter(|m| matches!(m, ServerMessage::Players(_)))
            .count();
        assert_eq!(rosters, 1);
    }
}

#[tokio::test]
async fn test_host_reset_aborts_the_round() {
    let room = room_with_seed(1);
    let mut players = join_n(&room, 2).await;
    room.start(Seat(1)).await.unwrap();
    drain_all(&mut players);

    assert!(room.reset(Seat(2)).await.is_err());
    assert_eq!(room.state().await, GameState::GettingPrompt);

    room.reset(Seat(1)).await.unwrap();
    assert_eq!(room.state().await, GameState::Waiting);
    let msgs = players[0].drain();
    assert_eq!(errors(&msgs), vec!["Round reset by Player #1"]);
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_registry_evicts_and_recreates() {
    let reg = RoomRegistry::new(RoomConfig::default(), JsonCodec);
    let (a, _) = Session::with_id("conn-a".into());
    let (b, _) = Session::with_id("conn-b".into());

    let (room, seat) = reg.join("abc", a).await.unwrap();
    assert_eq!(seat, Seat(1));
    assert_eq!(room.remove(&"conn-a".into()).await.remaining, 0);
    assert!(reg.evict_if_empty(&room).await);
    assert!(reg.get("abc").await.is_none());

    let (fresh, seat) = reg.join("abc", b).await.unwrap();
    assert!(!Arc::ptr_eq(&room, &fresh));
    assert_eq!(seat, Seat(1));
    assert_eq!(fresh.state().await, GameState::Waiting);
}

#[tokio::test]
async fn test_registry_join_reports_room_errors() {
    let reg = RoomRegistry::new(
        RoomConfig {
            capacity: 1,
            ..RoomConfig::default()
        },
        JsonCodec,
    );
    let (a, _) = Session::with_id("conn-a".into());
    let (b, _) = Session::with_id("conn-b".into());
    reg.join("abc", a).await.unwrap();
    assert_eq!(reg.join("abc", b).await.unwrap_err(), RoomError::RoomFull);
}
