use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::AminoError;

/// Паттерн обмена сообщениями: канал диспетчеризации, а не транспорт.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Publish/subscribe.
    Pubsub,
    /// Очередь задач (push/pull).
    Queue,
    /// Request/respond.
    Request,
}

/// Метод драйвера. Каждый метод принадлежит ровно одному паттерну.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Subscribe,
    Publish,
    Unsubscribe,
    Once,
    Queue,
    Process,
    Request,
    Respond,
}

impl Pattern {
    pub const ALL: [Pattern; 3] = [Pattern::Pubsub, Pattern::Queue, Pattern::Request];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Pattern::Pubsub => "pubsub",
            Pattern::Queue => "queue",
            Pattern::Request => "request",
        }
    }

    /// Методы, которые обслуживает паттерн.
    pub const fn methods(&self) -> &'static [Method] {
        match self {
            Pattern::Pubsub => &[
                Method::Subscribe,
                Method::Publish,
                Method::Unsubscribe,
                Method::Once,
            ],
            Pattern::Queue => &[Method::Queue, Method::Process],
            Pattern::Request => &[Method::Request, Method::Respond],
        }
    }
}

impl Method {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Subscribe => "subscribe",
            Method::Publish => "publish",
            Method::Unsubscribe => "unsubscribe",
            Method::Once => "once",
            Method::Queue => "queue",
            Method::Process => "process",
            Method::Request => "request",
            Method::Respond => "respond",
        }
    }

    pub const fn pattern(&self) -> Pattern {
        match self {
            Method::Subscribe | Method::Publish | Method::Unsubscribe | Method::Once => {
                Pattern::Pubsub
            }
            Method::Queue | Method::Process => Pattern::Queue,
            Method::Request | Method::Respond => Pattern::Request,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Method {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = AminoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pubsub" => Ok(Pattern::Pubsub),
            "queue" => Ok(Pattern::Queue),
            "request" => Ok(Pattern::Request),
            other => Err(AminoError::InvalidPattern(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что каждый метод паттерна указывает обратно на
    /// свой паттерн.
    #[test]
    fn test_methods_belong_to_pattern() {
        for pattern in Pattern::ALL {
            for method in pattern.methods() {
                assert_eq!(method.pattern(), pattern, "method {method}");
            }
        }
    }

    #[test]
    fn test_pattern_parse_and_display() {
        for pattern in Pattern::ALL {
            let parsed: Pattern = pattern.to_string().parse().unwrap();
            assert_eq!(parsed, pattern);
        }
        assert_eq!("  PubSub ".parse::<Pattern>().unwrap(), Pattern::Pubsub);
    }

    #[test]
    fn test_pattern_parse_unknown() {
        let err = "stream".parse::<Pattern>().unwrap_err();
        assert!(matches!(err, AminoError::InvalidPattern(ref p) if p == "stream"));
    }
}
