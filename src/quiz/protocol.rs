use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::room::AnswerRecord;

/// Current unix time in milliseconds. All wire timestamps use this clock so
/// clients can calibrate against it via `timeSync`.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn default_true() -> bool {
    true
}

/// Messages received from clients over the room WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        user_name: String,
        #[serde(default)]
        is_host: bool,
    },

    #[serde(rename_all = "camelCase")]
    TimeSync { client_send_time: u64 },

    #[serde(rename_all = "camelCase")]
    PlayerReady {
        #[serde(default = "default_true")]
        is_ready: bool,
    },

    StartGame,

    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        question_index: usize,
        #[serde(default)]
        answer_index: Option<usize>,
        #[serde(default)]
        answer_time: u64,
    },

    ExplanationEnd,

    EndGame,

    Leave,
}

/// Roster snapshot entry included in player* broadcasts and `gameEnd`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub score: u32,
    pub total_answer_time: u64,
}

/// Question payload sent to clients. The correct answer is withheld until
/// the `questionEnd` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionData {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub correct_answer: usize,
    pub correct_option: String,
    pub explanation: String,
    pub question_index: usize,
    pub is_main_quiz: bool,
    pub correct_count: usize,
    pub total_players: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizType {
    Sample,
    Main,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub player_id: String,
    pub player_name: String,
    pub score: u32,
    pub total_answer_time: u64,
    pub rank: usize,
}

/// Messages broadcast from a room to its connected players
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerJoined {
        players: Vec<PlayerInfo>,
        timestamp: u64,
    },

    PlayerLeft {
        players: Vec<PlayerInfo>,
        timestamp: u64,
    },

    PlayerReady {
        players: Vec<PlayerInfo>,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    TimeSync {
        server_time: u64,
        client_send_time: u64,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    GameStart { start_time: u64, timestamp: u64 },

    InstructionsEnd { timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    QuestionStart {
        question_index: usize,
        is_main_quiz: bool,
        start_time: u64,
        question_data: QuestionData,
        timestamp: u64,
    },

    QuestionEnd {
        result: QuestionResult,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    SampleQuizEnd {
        rankings: Vec<RankingEntry>,
        quiz_type: QuizType,
        total_questions: usize,
        start_time: u64,
        /// Seconds the ranking screen stays up, for client display
        duration: u64,
        timestamp: u64,
    },

    #[serde(rename_all = "camelCase")]
    PreparationStart { start_time: u64, timestamp: u64 },

    PreparationEnd { timestamp: u64 },

    CountdownStart { timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    GameEnd {
        rankings: Vec<RankingEntry>,
        players: Vec<PlayerInfo>,
        /// Full answer ledger as (questionIndex, playerId -> record) pairs
        all_answers: Vec<(usize, HashMap<String, AnswerRecord>)>,
        start_time: u64,
        duration: u64,
        timestamp: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","userName":"Aiko","isHost":true}"#).unwrap();
        match msg {
            ClientMessage::Join { user_name, is_host } => {
                assert_eq!(user_name, "Aiko");
                assert!(is_host);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_join_defaults_not_host() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","userName":"Ben"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { is_host: false, .. }));
    }

    #[test]
    fn test_parse_submit_answer_null_index() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"submitAnswer","questionIndex":2,"answerIndex":null,"answerTime":4500}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SubmitAnswer {
                question_index,
                answer_index,
                answer_time,
            } => {
                assert_eq!(question_index, 2);
                assert_eq!(answer_index, None);
                assert_eq!(answer_time, 4500);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_player_ready_default() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"playerReady"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::PlayerReady { is_ready: true }));
    }

    #[test]
    fn test_parse_unit_variants() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"startGame"}"#).unwrap(),
            ClientMessage::StartGame
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"explanationEnd"}"#).unwrap(),
            ClientMessage::ExplanationEnd
        ));
        // Extra fields like client-side timestamps are ignored
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"leave","timestamp":123}"#).unwrap(),
            ClientMessage::Leave
        ));
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"nextQuestion"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        let msg = ServerMessage::QuestionStart {
            question_index: 0,
            is_main_quiz: false,
            start_time: 1_000,
            question_data: QuestionData {
                question: "Q?".to_string(),
                options: vec!["a".to_string(), "b".to_string()],
            },
            timestamp: 1_001,
        };

        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "questionStart");
        assert_eq!(value["questionIndex"], 0);
        assert_eq!(value["isMainQuiz"], false);
        assert_eq!(value["questionData"]["options"][1], "b");
    }

    #[test]
    fn test_time_sync_echoes_client_time() {
        let msg = ServerMessage::TimeSync {
            server_time: 2_000,
            client_send_time: 1_500,
            timestamp: 2_000,
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "timeSync");
        assert_eq!(value["serverTime"], 2_000);
        assert_eq!(value["clientSendTime"], 1_500);
    }
}
