use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;

use super::protocol::{unix_millis, ClientMessage, QuizType, ServerMessage};
use super::questions::QuestionCatalog;
use super::ranking::compute_ranking;
use super::registry::RoomRegistry;
use super::room::{Phase, Room};
use super::scheduler::PhaseEvent;
use crate::config::TimingConfig;
use crate::error::QuizError;

/// The orchestration core: routes inbound messages to rooms, drives timed
/// phase transitions, and owns the connection-to-player lookup table.
///
/// All mutation of a given room happens under its own mutex, either in a
/// message handler or in a timer callback; the two are serialized per room.
pub struct QuizServer {
    registry: Arc<RoomRegistry>,
    /// conn_id -> (room_id, player_id), populated on join
    connections: RwLock<HashMap<u64, (String, String)>>,
    timing: TimingConfig,
    catalog: QuestionCatalog,
}

fn generate_player_id() -> String {
    let mut rng = rand::thread_rng();
    format!("{}{:08x}", unix_millis(), rng.gen::<u32>())
}

impl QuizServer {
    pub fn new(timing: TimingConfig, catalog: QuestionCatalog) -> Arc<Self> {
        Arc::new(Self {
            registry: RoomRegistry::new(),
            connections: RwLock::new(HashMap::new()),
            timing,
            catalog,
        })
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Entry point for every parsed client message. `room_id` comes from the
    /// connection's URL path; `outbox` is the connection's send capability.
    pub async fn handle_message(
        self: &Arc<Self>,
        conn_id: u64,
        room_id: &str,
        outbox: &mpsc::UnboundedSender<String>,
        message: ClientMessage,
    ) {
        match message {
            ClientMessage::Join { user_name, is_host } => {
                self.join(conn_id, room_id, user_name, is_host, outbox).await;
            }
            ClientMessage::TimeSync { client_send_time } => {
                self.time_sync(outbox, client_send_time);
            }
            ClientMessage::PlayerReady { is_ready } => {
                self.player_ready(conn_id, is_ready).await;
            }
            ClientMessage::StartGame => {
                self.start_game(conn_id).await;
            }
            ClientMessage::SubmitAnswer {
                question_index,
                answer_index,
                answer_time,
            } => {
                self.submit_answer(conn_id, question_index, answer_index, answer_time)
                    .await;
            }
            ClientMessage::ExplanationEnd => {
                self.explanation_end(conn_id).await;
            }
            ClientMessage::EndGame => {
                self.end_game(conn_id).await;
            }
            ClientMessage::Leave => {
                self.remove_connection(conn_id).await;
            }
        }
    }

    /// Connection closed or errored. Equivalent to an explicit leave.
    pub async fn disconnect(self: &Arc<Self>, conn_id: u64) {
        self.remove_connection(conn_id).await;
    }

    async fn connection_entry(&self, conn_id: u64) -> Option<(String, String)> {
        let connections = self.connections.read().await;
        connections.get(&conn_id).cloned()
    }

    async fn join(
        self: &Arc<Self>,
        conn_id: u64,
        room_id: &str,
        user_name: String,
        claimed_host: bool,
        outbox: &mpsc::UnboundedSender<String>,
    ) {
        {
            let connections = self.connections.read().await;
            if connections.contains_key(&conn_id) {
                tracing::warn!(conn_id = conn_id, "Connection already joined, ignoring duplicate join");
                return;
            }
        }

        let (room_arc, created) = self.registry.get_or_create(room_id).await;
        let player_id = generate_player_id();

        // The creating connection is the host; a host claim on an existing
        // room is ignored.
        if claimed_host && !created {
            tracing::warn!(
                room_id = %room_id,
                player_id = %player_id,
                "Host claim ignored, room already has a host"
            );
        }

        {
            let mut connections = self.connections.write().await;
            connections.insert(conn_id, (room_id.to_string(), player_id.clone()));
        }

        let mut room = room_arc.lock().await;
        room.add_player(player_id.clone(), user_name.clone(), created, outbox.clone());

        tracing::info!(
            room_id = %room_id,
            player_id = %player_id,
            user_name = %user_name,
            is_host = created,
            players = room.player_count(),
            "Player joined room"
        );

        room.broadcast(
            &ServerMessage::PlayerJoined {
                players: room.roster(),
                timestamp: unix_millis(),
            },
            None,
        );
    }

    /// Reply with server time and the echoed client send time, to the
    /// requesting connection only
    fn time_sync(&self, outbox: &mpsc::UnboundedSender<String>, client_send_time: u64) {
        let server_time = unix_millis();
        let reply = ServerMessage::TimeSync {
            server_time,
            client_send_time,
            timestamp: server_time,
        };
        match serde_json::to_string(&reply) {
            Ok(payload) => {
                if outbox.send(payload).is_err() {
                    tracing::debug!("Dropping timeSync reply to closed connection");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize timeSync reply"),
        }
    }

    async fn player_ready(&self, conn_id: u64, is_ready: bool) {
        let Some((room_id, player_id)) = self.connection_entry(conn_id).await else {
            tracing::warn!(conn_id = conn_id, "playerReady from unregistered connection");
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        let mut room = room_arc.lock().await;
        if let Err(e) = room.set_ready(&player_id, is_ready) {
            tracing::warn!(room_id = %room_id, error = %e, "playerReady rejected");
            return;
        }

        room.broadcast(
            &ServerMessage::PlayerReady {
                players: room.roster(),
                timestamp: unix_millis(),
            },
            None,
        );
    }

    async fn start_game(self: &Arc<Self>, conn_id: u64) {
        let Some((room_id, player_id)) = self.connection_entry(conn_id).await else {
            tracing::warn!(conn_id = conn_id, "startGame from unregistered connection");
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        let mut room = room_arc.lock().await;
        if !require_host(&room, &player_id, "startGame") {
            return;
        }

        match room.start_game() {
            Ok(start_time) => {
                room.broadcast(
                    &ServerMessage::GameStart {
                        start_time,
                        timestamp: unix_millis(),
                    },
                    None,
                );
                self.schedule(&mut room, self.timing.instructions, PhaseEvent::BeginSampleQuiz);
            }
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "startGame rejected");
            }
        }
    }

    async fn submit_answer(
        &self,
        conn_id: u64,
        question_index: usize,
        answer_index: Option<usize>,
        answer_time: u64,
    ) {
        let Some((room_id, player_id)) = self.connection_entry(conn_id).await else {
            tracing::warn!(conn_id = conn_id, "submitAnswer from unregistered connection");
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        // Always accepted, even after the answer window closed; the eventual
        // questionEnd broadcast is the submitter's implicit confirmation.
        let mut room = room_arc.lock().await;
        room.record_answer(&player_id, question_index, answer_index, answer_time);
    }

    /// Host signal that the main-quiz explanation screen is done; starts the
    /// countdown toward the next question
    async fn explanation_end(self: &Arc<Self>, conn_id: u64) {
        let Some((room_id, player_id)) = self.connection_entry(conn_id).await else {
            tracing::warn!(conn_id = conn_id, "explanationEnd from unregistered connection");
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        let mut room = room_arc.lock().await;
        if !require_host(&room, &player_id, "explanationEnd") {
            return;
        }
        if room.phase != Phase::MainQuiz {
            tracing::warn!(
                room_id = %room_id,
                phase = ?room.phase,
                "explanationEnd rejected outside main quiz"
            );
            return;
        }

        self.begin_countdown(&mut room);
    }

    async fn end_game(self: &Arc<Self>, conn_id: u64) {
        let Some((room_id, player_id)) = self.connection_entry(conn_id).await else {
            tracing::warn!(conn_id = conn_id, "endGame from unregistered connection");
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        let mut room = room_arc.lock().await;
        if !require_host(&room, &player_id, "endGame") {
            return;
        }

        self.finish_game(&mut room);
    }

    async fn remove_connection(self: &Arc<Self>, conn_id: u64) {
        let entry = {
            let mut connections = self.connections.write().await;
            connections.remove(&conn_id)
        };
        let Some((room_id, player_id)) = entry else {
            return;
        };
        let Some(room_arc) = self.registry.get(&room_id).await else {
            return;
        };

        let now_empty = {
            let mut room = room_arc.lock().await;
            if !room.remove_player(&player_id) {
                return;
            }
            tracing::info!(
                room_id = %room_id,
                player_id = %player_id,
                remaining = room.player_count(),
                "Player left room"
            );

            if room.is_empty() {
                true
            } else {
                room.broadcast(
                    &ServerMessage::PlayerLeft {
                        players: room.roster(),
                        timestamp: unix_millis(),
                    },
                    None,
                );
                false
            }
        };

        if now_empty {
            // Re-checked under the registry write lock: a join that raced in
            // between dropping the room lock and this call keeps the room.
            self.registry.remove_if_empty(&room_id).await;
        }
    }

    // --- phase driver ------------------------------------------------------

    /// Arm the room's single phase timer. Cancels whatever was pending; the
    /// spawned task re-validates its generation against the room before
    /// acting, so a superseded timer can never fire a transition for a phase
    /// the room already left.
    fn schedule(self: &Arc<Self>, room: &mut Room, delay: std::time::Duration, event: PhaseEvent) {
        let generation = room.timer.cancel();
        let server = self.clone();
        let room_id = room.id.clone();

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            server.on_phase_event(&room_id, generation, event).await;
        });
        room.timer.arm(handle);
    }

    async fn on_phase_event(self: &Arc<Self>, room_id: &str, generation: u64, event: PhaseEvent) {
        let Some(room_arc) = self.registry.get(room_id).await else {
            tracing::debug!(room_id = %room_id, event = ?event, "Timer fired for removed room");
            return;
        };

        let mut room = room_arc.lock().await;
        if !room.timer.is_current(generation) {
            tracing::debug!(room_id = %room_id, event = ?event, "Stale timer suppressed");
            return;
        }

        match event {
            PhaseEvent::BeginSampleQuiz => self.begin_sample_quiz(&mut room),
            PhaseEvent::OpenQuestion => self.open_question(&mut room),
            PhaseEvent::CloseQuestion => self.close_question(&mut room),
            PhaseEvent::BeginCountdown => self.begin_countdown(&mut room),
            PhaseEvent::AdvanceQuestion => self.advance_question(&mut room),
            PhaseEvent::BeginPreparation => self.begin_preparation(&mut room),
            PhaseEvent::BeginMainQuiz => self.begin_main_quiz(&mut room),
        }
    }

    fn begin_sample_quiz(self: &Arc<Self>, room: &mut Room) {
        if let Err(e) = room.begin_sample_quiz() {
            tracing::warn!(room_id = %room.id, error = %e, "Sample quiz start rejected");
            return;
        }

        tracing::info!(room_id = %room.id, "Sample quiz starting");
        room.broadcast(
            &ServerMessage::InstructionsEnd {
                timestamp: unix_millis(),
            },
            None,
        );
        self.schedule(room, self.timing.question_open_delay, PhaseEvent::OpenQuestion);
    }

    fn open_question(self: &Arc<Self>, room: &mut Room) {
        let questions = self.catalog.set_for(room.is_main_quiz);
        let Some(question) = questions.get(room.current_question) else {
            tracing::error!(
                room_id = %room.id,
                question_index = room.current_question,
                "No question to open"
            );
            return;
        };

        let start_time = room.open_question();
        tracing::info!(
            room_id = %room.id,
            question_index = room.current_question,
            is_main_quiz = room.is_main_quiz,
            "Question opened"
        );

        room.broadcast(
            &ServerMessage::QuestionStart {
                question_index: room.current_question,
                is_main_quiz: room.is_main_quiz,
                start_time,
                question_data: question.public_data(),
                timestamp: unix_millis(),
            },
            None,
        );

        let window = if room.is_main_quiz {
            self.timing.main_question
        } else {
            self.timing.sample_question
        };
        self.schedule(room, window, PhaseEvent::CloseQuestion);
    }

    fn close_question(self: &Arc<Self>, room: &mut Room) {
        let questions = self.catalog.set_for(room.is_main_quiz);
        let result = match room.question_results(questions) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(room_id = %room.id, error = %e, "Failed to compute question results");
                return;
            }
        };

        tracing::info!(
            room_id = %room.id,
            question_index = result.question_index,
            correct_count = result.correct_count,
            total_players = result.total_players,
            "Question closed"
        );

        room.broadcast(
            &ServerMessage::QuestionEnd {
                result,
                timestamp: unix_millis(),
            },
            None,
        );

        if room.is_main_quiz {
            // Host-gated: the presenter paces the explanation and sends
            // explanationEnd when done. No timer is armed.
        } else {
            self.schedule(room, self.timing.results_hold, PhaseEvent::BeginCountdown);
        }
    }

    fn begin_countdown(self: &Arc<Self>, room: &mut Room) {
        if room.phase != Phase::SampleQuiz && room.phase != Phase::MainQuiz {
            tracing::warn!(room_id = %room.id, phase = ?room.phase, "Countdown rejected");
            return;
        }

        room.broadcast(
            &ServerMessage::CountdownStart {
                timestamp: unix_millis(),
            },
            None,
        );
        self.schedule(room, self.timing.countdown, PhaseEvent::AdvanceQuestion);
    }

    fn advance_question(self: &Arc<Self>, room: &mut Room) {
        let next = room.advance_question();
        let set_len = self.catalog.set_for(room.is_main_quiz).len();

        if next < set_len {
            self.schedule(room, self.timing.question_open_delay, PhaseEvent::OpenQuestion);
            return;
        }

        if room.is_main_quiz {
            tracing::info!(room_id = %room.id, "Main quiz exhausted");
            self.finish_game(room);
        } else {
            self.begin_sample_ranking(room);
        }
    }

    fn begin_sample_ranking(self: &Arc<Self>, room: &mut Room) {
        if let Err(e) = room.begin_sample_ranking() {
            tracing::warn!(room_id = %room.id, error = %e, "Sample ranking rejected");
            return;
        }

        let rankings = compute_ranking(
            room.players(),
            room.answers(),
            &self.catalog.sample,
            self.timing.sample_penalty_ms(),
        );
        tracing::info!(room_id = %room.id, entries = rankings.len(), "Sample ranking computed");

        room.broadcast(
            &ServerMessage::SampleQuizEnd {
                rankings,
                quiz_type: QuizType::Sample,
                total_questions: self.catalog.sample.len(),
                start_time: unix_millis(),
                duration: self.timing.sample_ranking.as_secs(),
                timestamp: unix_millis(),
            },
            None,
        );
        self.schedule(room, self.timing.sample_ranking, PhaseEvent::BeginPreparation);
    }

    fn begin_preparation(self: &Arc<Self>, room: &mut Room) {
        if let Err(e) = room.begin_preparation() {
            tracing::warn!(room_id = %room.id, error = %e, "Preparation rejected");
            return;
        }

        tracing::info!(room_id = %room.id, "Preparation phase starting");
        room.broadcast(
            &ServerMessage::PreparationStart {
                start_time: unix_millis(),
                timestamp: unix_millis(),
            },
            None,
        );
        self.schedule(room, self.timing.preparation, PhaseEvent::BeginMainQuiz);
    }

    fn begin_main_quiz(self: &Arc<Self>, room: &mut Room) {
        if let Err(e) = room.begin_main_quiz() {
            tracing::warn!(room_id = %room.id, error = %e, "Main quiz start rejected");
            return;
        }

        tracing::info!(room_id = %room.id, "Main quiz starting");
        room.broadcast(
            &ServerMessage::PreparationEnd {
                timestamp: unix_millis(),
            },
            None,
        );
        self.schedule(room, self.timing.question_open_delay, PhaseEvent::OpenQuestion);
    }

    /// Terminal path, shared by host-forced endGame and main-set exhaustion
    fn finish_game(&self, room: &mut Room) {
        if let Err(e) = room.finish() {
            tracing::warn!(room_id = %room.id, error = %e, "endGame rejected");
            return;
        }

        let rankings = compute_ranking(
            room.players(),
            room.answers(),
            &self.catalog.main,
            self.timing.main_penalty_ms(),
        );
        room.apply_final_scores(&rankings);

        tracing::info!(room_id = %room.id, entries = rankings.len(), "Game finished");

        room.broadcast(
            &ServerMessage::GameEnd {
                rankings,
                players: room.roster(),
                all_answers: room.answer_ledger(),
                start_time: unix_millis(),
                duration: self.timing.game_end_screen.as_secs(),
                timestamp: unix_millis(),
            },
            None,
        );
    }
}

fn require_host(room: &Room, player_id: &str, action: &str) -> bool {
    if room.is_host(player_id) {
        true
    } else {
        let error = QuizError::Unauthorized(player_id.to_string());
        tracing::warn!(
            room_id = %room.id,
            action = action,
            error = %error,
            "Host-only action rejected"
        );
        false
    }
}
