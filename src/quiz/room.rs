use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::protocol::{unix_millis, PlayerInfo, QuestionResult, ServerMessage};
use super::questions::Question;
use super::scheduler::PhaseTimer;
use crate::error::{QuizError, Result};

/// The fixed stages a session moves through. Phases only advance forward;
/// a room never regresses except by teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Instructions,
    SampleQuiz,
    SampleRanking,
    Preparation,
    MainQuiz,
    Finished,
}

/// One player's latest submission for a question. Resubmission overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub answer_index: Option<usize>,
    /// Client-reported milliseconds from question start to submission.
    /// Trusted as-is; see the ranking penalty rules.
    pub answer_time: u64,
    /// Server receive time, unix ms
    pub timestamp: u64,
}

/// A player registered in one room. The room holds the only sending handle
/// for the player's connection; the transport layer drains the other end.
#[derive(Debug)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub score: u32,
    pub total_answer_time: u64,
    outbox: mpsc::UnboundedSender<String>,
}

impl Player {
    pub fn new(id: String, name: String, is_host: bool, outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            name,
            is_host,
            is_ready: false,
            score: 0,
            total_answer_time: 0,
            outbox,
        }
    }

    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
            score: self.score,
            total_answer_time: self.total_answer_time,
        }
    }
}

/// All state for one quiz session: roster, phase machine, answer ledger and
/// the single pending phase timer.
pub struct Room {
    pub id: String,
    pub host_player_id: Option<String>,
    pub phase: Phase,
    pub current_question: usize,
    pub is_main_quiz: bool,
    pub question_start_time: Option<u64>,
    pub timer: PhaseTimer,
    players: HashMap<String, Player>,
    answers: HashMap<usize, HashMap<String, AnswerRecord>>,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            host_player_id: None,
            phase: Phase::Waiting,
            current_question: 0,
            is_main_quiz: false,
            question_start_time: None,
            timer: PhaseTimer::new(),
            players: HashMap::new(),
            answers: HashMap::new(),
        }
    }

    pub fn add_player(
        &mut self,
        player_id: String,
        name: String,
        is_host: bool,
        outbox: mpsc::UnboundedSender<String>,
    ) {
        if is_host {
            self.host_player_id = Some(player_id.clone());
        }
        self.players.insert(
            player_id.clone(),
            Player::new(player_id, name, is_host, outbox),
        );
    }

    pub fn remove_player(&mut self, player_id: &str) -> bool {
        self.players.remove(player_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_player_id.as_deref() == Some(player_id)
    }

    pub fn players(&self) -> &HashMap<String, Player> {
        &self.players
    }

    pub fn answers(&self) -> &HashMap<usize, HashMap<String, AnswerRecord>> {
        &self.answers
    }

    /// Roster snapshot for player* broadcasts and `gameEnd`
    pub fn roster(&self) -> Vec<PlayerInfo> {
        let mut roster: Vec<PlayerInfo> = self.players.values().map(Player::info).collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));
        roster
    }

    pub fn set_ready(&mut self, player_id: &str, is_ready: bool) -> Result<()> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| QuizError::PlayerNotFound(player_id.to_string()))?;
        player.is_ready = is_ready;
        Ok(())
    }

    /// Record an answer. Always accepted regardless of timer state; the
    /// server trusts client-reported timing and the latest submission wins.
    pub fn record_answer(
        &mut self,
        player_id: &str,
        question_index: usize,
        answer_index: Option<usize>,
        answer_time: u64,
    ) {
        self.answers.entry(question_index).or_default().insert(
            player_id.to_string(),
            AnswerRecord {
                answer_index,
                answer_time,
                timestamp: unix_millis(),
            },
        );

        tracing::debug!(
            room_id = %self.id,
            player_id = %player_id,
            question_index = question_index,
            answer_index = ?answer_index,
            answer_time_ms = answer_time,
            "Answer recorded"
        );
    }

    /// Result payload for the current question's `questionEnd` broadcast
    pub fn question_results(&self, questions: &[Question]) -> Result<QuestionResult> {
        let question = questions
            .get(self.current_question)
            .ok_or(QuizError::QuestionOutOfRange(self.current_question))?;

        let correct_count = self
            .answers
            .get(&self.current_question)
            .map(|by_player| {
                by_player
                    .values()
                    .filter(|record| record.answer_index == Some(question.correct_answer))
                    .count()
            })
            .unwrap_or(0);

        Ok(QuestionResult {
            correct_answer: question.correct_answer,
            correct_option: question.options[question.correct_answer].clone(),
            explanation: question.explanation.clone().unwrap_or_default(),
            question_index: self.current_question,
            is_main_quiz: self.is_main_quiz,
            correct_count,
            total_players: self.players.len(),
        })
    }

    /// Write final scores and times back to the roster
    pub fn apply_final_scores(&mut self, rankings: &[super::protocol::RankingEntry]) {
        for entry in rankings {
            if let Some(player) = self.players.get_mut(&entry.player_id) {
                player.score = entry.score;
                player.total_answer_time = entry.total_answer_time;
            }
        }
    }

    /// Answer ledger snapshot for the `gameEnd` broadcast, ordered by
    /// question index
    pub fn answer_ledger(&self) -> Vec<(usize, HashMap<String, AnswerRecord>)> {
        let mut ledger: Vec<_> = self
            .answers
            .iter()
            .map(|(index, by_player)| (*index, by_player.clone()))
            .collect();
        ledger.sort_by_key(|(index, _)| *index);
        ledger
    }

    /// Send a message to every registered player, except the optionally
    /// excluded one. Best-effort: a closed outbox is skipped, not retried.
    pub fn broadcast(&self, message: &ServerMessage, exclude: Option<&str>) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(room_id = %self.id, error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        for player in self.players.values() {
            if Some(player.id.as_str()) == exclude {
                continue;
            }
            if player.outbox.send(payload.clone()).is_err() {
                tracing::debug!(
                    room_id = %self.id,
                    player_id = %player.id,
                    "Dropping broadcast to closed connection"
                );
            }
        }
    }

    // --- phase transitions -------------------------------------------------

    /// Waiting -> Instructions, host-triggered. Returns the phase start time.
    pub fn start_game(&mut self) -> Result<u64> {
        if self.phase != Phase::Waiting {
            return Err(QuizError::invalid_phase("startGame", self.phase));
        }
        self.phase = Phase::Instructions;
        let start_time = unix_millis();
        tracing::info!(
            room_id = %self.id,
            players = self.players.len(),
            "Game started, entering instructions"
        );
        Ok(start_time)
    }

    /// Instructions -> SampleQuiz; resets the question cursor
    pub fn begin_sample_quiz(&mut self) -> Result<()> {
        if self.phase != Phase::Instructions {
            return Err(QuizError::invalid_phase("beginSampleQuiz", self.phase));
        }
        self.phase = Phase::SampleQuiz;
        self.current_question = 0;
        self.is_main_quiz = false;
        Ok(())
    }

    /// SampleQuiz -> SampleRanking, once the sample set is exhausted
    pub fn begin_sample_ranking(&mut self) -> Result<()> {
        if self.phase != Phase::SampleQuiz {
            return Err(QuizError::invalid_phase("beginSampleRanking", self.phase));
        }
        self.phase = Phase::SampleRanking;
        Ok(())
    }

    /// SampleRanking -> Preparation
    pub fn begin_preparation(&mut self) -> Result<()> {
        if self.phase != Phase::SampleRanking {
            return Err(QuizError::invalid_phase("beginPreparation", self.phase));
        }
        self.phase = Phase::Preparation;
        Ok(())
    }

    /// Preparation -> MainQuiz; resets the question cursor
    pub fn begin_main_quiz(&mut self) -> Result<()> {
        if self.phase != Phase::Preparation {
            return Err(QuizError::invalid_phase("beginMainQuiz", self.phase));
        }
        self.phase = Phase::MainQuiz;
        self.current_question = 0;
        self.is_main_quiz = true;
        Ok(())
    }

    /// Terminal transition. Reached from MainQuiz when the set is exhausted
    /// or whenever the host forces the end; both converge here.
    pub fn finish(&mut self) -> Result<()> {
        if self.phase == Phase::Finished {
            return Err(QuizError::invalid_phase("endGame", self.phase));
        }
        self.timer.cancel();
        self.phase = Phase::Finished;
        Ok(())
    }

    /// Open the answer window for the current question
    pub fn open_question(&mut self) -> u64 {
        let start_time = unix_millis();
        self.question_start_time = Some(start_time);
        start_time
    }

    pub fn advance_question(&mut self) -> usize {
        self.current_question += 1;
        self.current_question
    }
}
