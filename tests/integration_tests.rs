//! Integration tests for the emoji-story game server
//!
//! These tests validate cross-component interactions and real network behavior.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use server::network::{read_packet, write_packet, Server};
use server::registry::RoomRegistry;
use server::room::{Phase, RoomError};
use shared::{ClientPacket, EmojiCombo, Guess, PlayerInfo, ServerPacket};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for network protocol validation
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            ClientPacket::CreateRoom {
                name: "ana".to_string(),
                avatar: "🦊".to_string(),
            },
            ClientPacket::JoinRoom {
                room_code: "AB12CD".to_string(),
                name: "bo".to_string(),
                avatar: "🐸".to_string(),
            },
            ClientPacket::SubmitText {
                room_code: "AB12CD".to_string(),
                text: "The frog learned to juggle.".to_string(),
            },
            ClientPacket::SubmitGuess {
                room_code: "AB12CD".to_string(),
                guess: Guess {
                    emoji_combo: EmojiCombo::new(["🎈", "🚀", "🍕"]),
                    claimed_author: 2,
                },
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: ClientPacket = deserialize(&serialized).unwrap();

            // Verify packet type matches (simplified check)
            match (&packet, &deserialized) {
                (ClientPacket::CreateRoom { .. }, ClientPacket::CreateRoom { .. }) => {}
                (ClientPacket::JoinRoom { .. }, ClientPacket::JoinRoom { .. }) => {}
                (ClientPacket::SubmitText { .. }, ClientPacket::SubmitText { .. }) => {}
                (ClientPacket::SubmitGuess { .. }, ClientPacket::SubmitGuess { .. }) => {}
                _ => panic!("Packet type mismatch after serialization"),
            }
        }
    }

    /// Tests framed packets over a real TCP connection
    #[tokio::test]
    async fn framed_tcp_communication() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo server for one frame
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            if let Ok(Some(packet)) = read_packet::<_, ClientPacket>(&mut stream).await {
                let _ = write_packet(&mut stream, &packet).await;
            }
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let packet = ClientPacket::JoinRoom {
            room_code: "AB12CD".to_string(),
            name: "ana".to_string(),
            avatar: "🦊".to_string(),
        };
        write_packet(&mut stream, &packet).await.unwrap();

        let echoed: Option<ClientPacket> = read_packet(&mut stream).await.unwrap();
        match echoed {
            Some(ClientPacket::JoinRoom {
                room_code, name, ..
            }) => {
                assert_eq!(room_code, "AB12CD");
                assert_eq!(name, "ana");
            }
            other => panic!("Wrong frame received: {other:?}"),
        }
    }
}

/// GAME FLOW INTEGRATION TESTS
mod game_flow_tests {
    use super::*;

    /// Tests a full round where everyone guesses exactly right
    #[test]
    fn full_round_all_correct() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));
        let code = start_room(&mut registry, 3);
        submit_all_stories(&mut registry, &code, 3);
        assert_eq!(registry.room(&code).unwrap().phase(), Phase::Guessing);

        submit_correct_guesses(&mut registry, &code, &[1, 2, 3]);

        let room = registry.room(&code).unwrap();
        assert_eq!(room.phase(), Phase::Results);
        assert_eq!(room.chat_feed().len(), 3);
        // +2 emoji guessed by one player, +2 guessed as author, +0.5 + 0.5 as guesser
        for id in 1..=3 {
            assert_approx_eq!(room.score_of(id), 5.0, 1e-6);
        }
    }

    /// Tests that the order guesses arrive in does not change the scores
    #[test]
    fn guess_arrival_order_is_irrelevant() {
        for order in [[1u32, 2, 3], [3, 1, 2], [2, 3, 1]] {
            let mut registry = RoomRegistry::new(Duration::from_secs(180));
            let code = start_room(&mut registry, 3);
            submit_all_stories(&mut registry, &code, 3);
            submit_correct_guesses(&mut registry, &code, &order);

            let room = registry.room(&code).unwrap();
            assert_eq!(room.phase(), Phase::Results);
            for id in 1..=3 {
                assert_approx_eq!(room.score_of(id), 5.0, 1e-6);
            }
        }
    }

    /// Tests the user-facing error for each rejected request
    #[test]
    fn room_error_taxonomy() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));

        let err = registry
            .join_room("NOPE00", PlayerInfo::new(9, "ghost", "👻"))
            .unwrap_err();
        assert_eq!(err, RoomError::InvalidRoom);

        let (code, _) = registry.create_room(PlayerInfo::new(1, "ana", "🦊"));
        registry
            .join_room(&code, PlayerInfo::new(2, "bo", "🐸"))
            .unwrap();

        let err = registry.start_game(&code, 2, 1_000).unwrap_err();
        assert_eq!(err, RoomError::NotHost);

        let err = registry.start_game(&code, 1, 1_000).unwrap_err();
        assert_eq!(err, RoomError::TooFewParticipants);

        registry
            .join_room(&code, PlayerInfo::new(3, "cleo", "🐙"))
            .unwrap();
        registry.start_game(&code, 1, 1_000).unwrap();

        let err = registry.start_game(&code, 1, 2_000).unwrap_err();
        assert_eq!(err, RoomError::AlreadyStarted);

        let err = registry
            .join_room(&code, PlayerInfo::new(4, "dara", "🦉"))
            .unwrap_err();
        assert_eq!(err, RoomError::AlreadyStarted);

        let err = registry
            .submit_guess(
                &code,
                2,
                Guess {
                    emoji_combo: EmojiCombo::new(["🎈", "🚀", "🍕"]),
                    claimed_author: 1,
                },
            )
            .unwrap_err();
        assert_eq!(err, RoomError::WrongPhase);
    }

    /// Tests that scores carry over when the host starts another game
    #[test]
    fn scores_accumulate_across_games() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));
        let code = start_room(&mut registry, 3);
        submit_all_stories(&mut registry, &code, 3);
        submit_correct_guesses(&mut registry, &code, &[1, 2, 3]);

        registry.request_leaderboard(&code, 1).unwrap();
        registry.new_game(&code, 1).unwrap();

        let room = registry.room(&code).unwrap();
        assert_eq!(room.phase(), Phase::Lobby);
        assert_eq!(room.players().len(), 3);
        assert_approx_eq!(room.score_of(2), 5.0, 1e-6);

        registry.start_game(&code, 1, 2_000).unwrap();
        submit_all_stories(&mut registry, &code, 3);
        submit_correct_guesses(&mut registry, &code, &[1, 2, 3]);

        let room = registry.room(&code).unwrap();
        assert_eq!(room.round(), 2);
        for id in 1..=3 {
            assert_approx_eq!(room.score_of(id), 10.0, 1e-6);
        }
    }

    /// Tests that a departure mid-writing can complete the phase
    #[test]
    fn departure_completes_writing_phase() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));
        let code = start_room(&mut registry, 4);
        for id in [1, 2, 3] {
            registry
                .submit_story(&code, id, format!("story by player {id}"))
                .unwrap();
        }
        assert_eq!(registry.room(&code).unwrap().phase(), Phase::Writing);

        // The only player still writing leaves; nothing is outstanding now.
        registry.remove_connection(4);

        let room = registry.room(&code).unwrap();
        assert_eq!(room.phase(), Phase::Guessing);
        assert_eq!(room.players().len(), 3);
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    /// Tests a complete game against a running server over real sockets
    #[tokio::test]
    async fn full_game_over_tcp() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_secs(180))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut ana = TcpStream::connect(addr).await.unwrap();
        let mut bo = TcpStream::connect(addr).await.unwrap();
        let mut cleo = TcpStream::connect(addr).await.unwrap();

        write_packet(
            &mut ana,
            &ClientPacket::CreateRoom {
                name: "ana".to_string(),
                avatar: "🦊".to_string(),
            },
        )
        .await
        .unwrap();
        let packet = expect_packet(&mut ana, |p| {
            matches!(p, ServerPacket::RoomCreated { .. })
        })
        .await;
        let ServerPacket::RoomCreated { room_code, players } = packet else {
            unreachable!()
        };
        assert_eq!(players.len(), 1);

        for (stream, name, avatar) in [(&mut bo, "bo", "🐸"), (&mut cleo, "cleo", "🐙")] {
            write_packet(
                stream,
                &ClientPacket::JoinRoom {
                    room_code: room_code.clone(),
                    name: name.to_string(),
                    avatar: avatar.to_string(),
                },
            )
            .await
            .unwrap();
            expect_packet(stream, |p| matches!(p, ServerPacket::RoomJoined { .. })).await;
        }

        write_packet(
            &mut ana,
            &ClientPacket::StartGame {
                room_code: room_code.clone(),
            },
        )
        .await
        .unwrap();
        for stream in [&mut ana, &mut bo, &mut cleo] {
            expect_packet(stream, |p| matches!(p, ServerPacket::WritingPhase { .. })).await;
        }

        for (stream, text) in [
            (&mut ana, "The fox ordered pizza."),
            (&mut bo, "A frog learned to juggle."),
            (&mut cleo, "The octopus fixed the submarine."),
        ] {
            write_packet(
                stream,
                &ClientPacket::SubmitText {
                    room_code: room_code.clone(),
                    text: text.to_string(),
                },
            )
            .await
            .unwrap();
        }

        // Guessing: the payload must not leak whose story it is.
        for stream in [&mut ana, &mut bo, &mut cleo] {
            let packet = expect_packet(stream, |p| {
                matches!(p, ServerPacket::GuessingPhase { .. })
            })
            .await;
            let ServerPacket::GuessingPhase {
                emoji_options,
                candidate_authors,
                ..
            } = packet
            else {
                unreachable!()
            };
            assert_eq!(emoji_options.len(), 6);
            assert_eq!(candidate_authors.len(), 2);

            write_packet(
                stream,
                &ClientPacket::SubmitGuess {
                    room_code: room_code.clone(),
                    guess: Guess {
                        emoji_combo: emoji_options[0].clone(),
                        claimed_author: candidate_authors[0].id,
                    },
                },
            )
            .await
            .unwrap();
        }

        for stream in [&mut ana, &mut bo, &mut cleo] {
            let packet = expect_packet(stream, |p| {
                matches!(p, ServerPacket::ResultsPhase { .. })
            })
            .await;
            if let ServerPacket::ResultsPhase {
                chat_feed,
                players,
                leaderboard,
                ..
            } = packet
            {
                assert_eq!(chat_feed.len(), 3);
                assert_eq!(players.len(), 3);
                assert_eq!(leaderboard.len(), 3);
            }
        }
    }

    /// Tests that the writing deadline pushes a stalled room into guessing
    #[tokio::test]
    async fn writing_deadline_closes_phase() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(200))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut ana = TcpStream::connect(addr).await.unwrap();
        let mut bo = TcpStream::connect(addr).await.unwrap();
        let mut cleo = TcpStream::connect(addr).await.unwrap();

        write_packet(
            &mut ana,
            &ClientPacket::CreateRoom {
                name: "ana".to_string(),
                avatar: "🦊".to_string(),
            },
        )
        .await
        .unwrap();
        let packet = expect_packet(&mut ana, |p| {
            matches!(p, ServerPacket::RoomCreated { .. })
        })
        .await;
        let ServerPacket::RoomCreated { room_code, .. } = packet else {
            unreachable!()
        };

        for (stream, name) in [(&mut bo, "bo"), (&mut cleo, "cleo")] {
            write_packet(
                stream,
                &ClientPacket::JoinRoom {
                    room_code: room_code.clone(),
                    name: name.to_string(),
                    avatar: "🐸".to_string(),
                },
            )
            .await
            .unwrap();
            expect_packet(stream, |p| matches!(p, ServerPacket::RoomJoined { .. })).await;
        }

        write_packet(
            &mut ana,
            &ClientPacket::StartGame {
                room_code: room_code.clone(),
            },
        )
        .await
        .unwrap();
        for stream in [&mut ana, &mut bo, &mut cleo] {
            expect_packet(stream, |p| matches!(p, ServerPacket::WritingPhase { .. })).await;
        }

        // Only two of three submit; the deadline must close the phase anyway.
        for (stream, text) in [
            (&mut bo, "A frog learned to juggle."),
            (&mut cleo, "The octopus fixed the submarine."),
        ] {
            write_packet(
                stream,
                &ClientPacket::SubmitText {
                    room_code: room_code.clone(),
                    text: text.to_string(),
                },
            )
            .await
            .unwrap();
        }

        for stream in [&mut ana, &mut bo, &mut cleo] {
            let packet = expect_packet(stream, |p| {
                matches!(p, ServerPacket::GuessingPhase { .. })
            })
            .await;
            if let ServerPacket::GuessingPhase {
                candidate_authors, ..
            } = packet
            {
                // Everyone but the guesser themself stays a candidate.
                assert_eq!(candidate_authors.len(), 2);
            }
        }
    }

    /// Tests that a rejected request comes back as a room error packet
    #[tokio::test]
    async fn rejected_request_returns_error_packet() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_secs(180))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_packet(
            &mut stream,
            &ClientPacket::JoinRoom {
                room_code: "ZZZZZ9".to_string(),
                name: "ghost".to_string(),
                avatar: "👻".to_string(),
            },
        )
        .await
        .unwrap();

        let packet = expect_packet(&mut stream, |p| {
            matches!(p, ServerPacket::RoomError { .. })
        })
        .await;
        if let ServerPacket::RoomError { message } = packet {
            assert_eq!(message, "Invalid room code.");
        }
    }
}

/// STRESS AND ERROR HANDLING TESTS
mod stress_tests {
    use super::*;

    /// Tests many rooms playing through a round in one registry
    #[test]
    fn many_rooms_play_independently() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));
        let mut codes = Vec::new();

        for r in 0..40u32 {
            let base = r * 3;
            let (code, _) = registry.create_room(PlayerInfo::new(base + 1, "host", "🦊"));
            registry
                .join_room(&code, PlayerInfo::new(base + 2, "left", "🐸"))
                .unwrap();
            registry
                .join_room(&code, PlayerInfo::new(base + 3, "right", "🐙"))
                .unwrap();
            registry.start_game(&code, base + 1, 1_000).unwrap();
            codes.push((code, base));
        }
        assert_eq!(registry.room_count(), 40);

        for (code, base) in &codes {
            for id in base + 1..=base + 3 {
                registry
                    .submit_story(code, id, format!("story by player {id}"))
                    .unwrap();
            }
            let order = [base + 1, base + 2, base + 3];
            submit_correct_guesses(&mut registry, code, &order);
            assert_eq!(registry.room(code).unwrap().phase(), Phase::Results);
        }

        // Hosts hang up; every room is destroyed.
        for (_, base) in &codes {
            registry.remove_connection(base + 1);
        }
        assert_eq!(registry.room_count(), 0);
    }

    /// Tests a large room playing a full round
    #[test]
    fn twenty_player_round() {
        let mut registry = RoomRegistry::new(Duration::from_secs(180));
        let code = start_room(&mut registry, 20);
        submit_all_stories(&mut registry, &code, 20);

        let order: Vec<u32> = (1..=20).collect();
        submit_correct_guesses(&mut registry, &code, &order);

        let room = registry.room(&code).unwrap();
        assert_eq!(room.phase(), Phase::Results);
        assert_eq!(room.chat_feed().len(), 20);
        for id in 1..=20 {
            assert_approx_eq!(room.score_of(id), 5.0, 1e-6);
        }
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = ClientPacket::CreateRoom {
            name: "ana".to_string(),
            avatar: "🦊".to_string(),
        };
        let valid_data = serialize(&valid_packet).unwrap();

        // Test truncated packet
        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<ClientPacket, _> = deserialize(truncated_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize truncated packet"
        );

        // Test corrupted packet
        let mut corrupted_data = valid_data.clone();
        if !corrupted_data.is_empty() {
            corrupted_data[0] = 0xFF; // Corrupt variant tag
        }
        let result: Result<ClientPacket, _> = deserialize(&corrupted_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize corrupted packet"
        );

        // Test empty packet
        let empty_data = vec![];
        let result: Result<ClientPacket, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }
}

// HELPER FUNCTIONS

/// Creates a room seating players 1..=n and starts the game.
fn start_room(registry: &mut RoomRegistry, n: u32) -> String {
    let (code, _) = registry.create_room(PlayerInfo::new(1, "player-1", "🦊"));
    for id in 2..=n {
        registry
            .join_room(&code, PlayerInfo::new(id, &format!("player-{id}"), "🐸"))
            .unwrap();
    }
    registry.start_game(&code, 1, 1_000).unwrap();
    code
}

/// Submits a story for every player, in id order.
fn submit_all_stories(registry: &mut RoomRegistry, code: &str, n: u32) {
    for id in 1..=n {
        registry
            .submit_story(code, id, format!("story by player {id}"))
            .unwrap();
    }
}

/// Submits the exactly-right guess for each listed player.
fn submit_correct_guesses(registry: &mut RoomRegistry, code: &str, order: &[u32]) {
    for &id in order {
        let room = registry.room(code).unwrap();
        let author = room.assigned_author(id).unwrap();
        let combo = room.combo_of(author).unwrap().clone();
        registry
            .submit_guess(
                code,
                id,
                Guess {
                    emoji_combo: combo,
                    claimed_author: author,
                },
            )
            .unwrap();
    }
}

/// Reads packets until one matches, failing the test after five seconds.
async fn expect_packet<F>(stream: &mut TcpStream, want: F) -> ServerPacket
where
    F: Fn(&ServerPacket) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            match read_packet::<_, ServerPacket>(stream).await.unwrap() {
                Some(packet) if want(&packet) => return packet,
                Some(_) => continue,
                None => panic!("server closed the connection"),
            }
        }
    })
    .await
    .expect("timed out waiting for a matching packet")
}
