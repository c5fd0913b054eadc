use server::network::{read_packet, write_packet};
use shared::{ClientPacket, Guess, ServerPacket};
use tokio::net::TcpStream;

async fn send(
    stream: &mut TcpStream,
    who: &str,
    packet: ClientPacket,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("[{}] -> {:?}", who, packet);
    write_packet(stream, &packet).await?;
    Ok(())
}

/// Reads packets (printing each) until one matches, so broadcasts arriving
/// in between never derail the script.
async fn wait_for<F>(
    stream: &mut TcpStream,
    who: &str,
    want: F,
) -> Result<ServerPacket, Box<dyn std::error::Error>>
where
    F: Fn(&ServerPacket) -> bool,
{
    loop {
        match read_packet::<_, ServerPacket>(stream).await? {
            Some(packet) => {
                println!("[{}] <- {:?}", who, packet);
                if want(&packet) {
                    return Ok(packet);
                }
            }
            None => return Err("server closed the connection".into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr = "127.0.0.1:3000";
    println!("Connecting three test players to {}", server_addr);

    let mut ana = TcpStream::connect(server_addr).await?;
    let mut bo = TcpStream::connect(server_addr).await?;
    let mut cleo = TcpStream::connect(server_addr).await?;

    // Ana opens a room; the other two join with its code.
    send(
        &mut ana,
        "ana",
        ClientPacket::CreateRoom {
            name: "ana".to_string(),
            avatar: "🦊".to_string(),
        },
    )
    .await?;
    let packet = wait_for(&mut ana, "ana", |p| {
        matches!(p, ServerPacket::RoomCreated { .. })
    })
    .await?;
    let ServerPacket::RoomCreated { room_code, .. } = packet else {
        unreachable!()
    };
    println!("Room code: {}", room_code);

    send(
        &mut bo,
        "bo",
        ClientPacket::JoinRoom {
            room_code: room_code.clone(),
            name: "bo".to_string(),
            avatar: "🐸".to_string(),
        },
    )
    .await?;
    wait_for(&mut bo, "bo", |p| matches!(p, ServerPacket::RoomJoined { .. })).await?;

    send(
        &mut cleo,
        "cleo",
        ClientPacket::JoinRoom {
            room_code: room_code.clone(),
            name: "cleo".to_string(),
            avatar: "🐙".to_string(),
        },
    )
    .await?;
    wait_for(&mut cleo, "cleo", |p| {
        matches!(p, ServerPacket::RoomJoined { .. })
    })
    .await?;

    // Host starts the game; everyone gets their secret combination.
    send(
        &mut ana,
        "ana",
        ClientPacket::StartGame {
            room_code: room_code.clone(),
        },
    )
    .await?;
    for (stream, who) in [(&mut ana, "ana"), (&mut bo, "bo"), (&mut cleo, "cleo")] {
        wait_for(stream, who, |p| matches!(p, ServerPacket::WritingPhase { .. })).await?;
    }

    // Everyone writes; the third story flips the room into guessing.
    for (stream, who, text) in [
        (&mut ana, "ana", "The fox ordered pizza for the whole crew."),
        (&mut bo, "bo", "A frog learned to juggle in zero gravity."),
        (&mut cleo, "cleo", "The octopus fixed the submarine with tape."),
    ] {
        send(
            stream,
            who,
            ClientPacket::SubmitText {
                room_code: room_code.clone(),
                text: text.to_string(),
            },
        )
        .await?;
    }

    // Each player guesses naively: first option, first candidate.
    for (stream, who) in [(&mut ana, "ana"), (&mut bo, "bo"), (&mut cleo, "cleo")] {
        let packet = wait_for(stream, who, |p| {
            matches!(p, ServerPacket::GuessingPhase { .. })
        })
        .await?;
        let ServerPacket::GuessingPhase {
            emoji_options,
            candidate_authors,
            ..
        } = packet
        else {
            unreachable!()
        };
        send(
            stream,
            who,
            ClientPacket::SubmitGuess {
                room_code: room_code.clone(),
                guess: Guess {
                    emoji_combo: emoji_options[0].clone(),
                    claimed_author: candidate_authors[0].id,
                },
            },
        )
        .await?;
    }

    for (stream, who) in [(&mut ana, "ana"), (&mut bo, "bo"), (&mut cleo, "cleo")] {
        let packet = wait_for(stream, who, |p| {
            matches!(p, ServerPacket::ResultsPhase { .. })
        })
        .await?;
        if let ServerPacket::ResultsPhase {
            leaderboard,
            chat_feed,
            ..
        } = packet
        {
            if who == "ana" {
                println!(
                    "Round finished: {} stories revealed, leaderboard {:?}",
                    chat_feed.len(),
                    leaderboard
                );
            }
        }
    }

    // Host steps through part of the reveal, then pulls up the leaderboard.
    for _ in 0..4 {
        send(
            &mut ana,
            "ana",
            ClientPacket::AdvanceResults {
                room_code: room_code.clone(),
            },
        )
        .await?;
    }
    send(
        &mut ana,
        "ana",
        ClientPacket::RequestLeaderboard {
            room_code: room_code.clone(),
        },
    )
    .await?;
    for (stream, who) in [(&mut ana, "ana"), (&mut bo, "bo"), (&mut cleo, "cleo")] {
        let packet = wait_for(stream, who, |p| {
            matches!(p, ServerPacket::LeaderboardPhase { .. })
        })
        .await?;
        if let ServerPacket::LeaderboardPhase { justifications, .. } = packet {
            if who == "ana" {
                for (player, entries) in &justifications {
                    for entry in entries {
                        println!("  player {}: {} ({:+})", player, entry.reason, entry.delta);
                    }
                }
            }
        }
    }

    // Back to the lobby for another game, then hang up.
    send(
        &mut ana,
        "ana",
        ClientPacket::NewGame {
            room_code: room_code.clone(),
        },
    )
    .await?;
    for (stream, who) in [(&mut ana, "ana"), (&mut bo, "bo"), (&mut cleo, "cleo")] {
        wait_for(stream, who, |p| {
            matches!(p, ServerPacket::NewGameReady { .. })
        })
        .await?;
    }

    println!("Test client finished");
    Ok(())
}
