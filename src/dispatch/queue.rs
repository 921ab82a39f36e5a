use std::collections::VecDeque;

use crate::Command;

/// Очередь команд одного паттерна, накопленных до готовности драйвера.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет команду в хвост. Возвращает её позицию (0 означает голову).
    pub fn push(
        &mut self,
        command: Command,
    ) -> usize {
        self.entries.push_back(command);
        self.entries.len() - 1
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn publish(n: i32) -> Command {
        Command::Publish {
            channel: "c".into(),
            payload: json!(n),
        }
    }

    #[test]
    fn test_fifo_order_and_positions() {
        let mut queue = CommandQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.push(publish(1)), 0);
        assert_eq!(queue.push(publish(2)), 1);
        assert_eq!(queue.len(), 2);

        for expected in [1, 2] {
            match queue.pop() {
                Some(Command::Publish { payload, .. }) => assert_eq!(payload, json!(expected)),
                other => panic!("unexpected entry: {other:?}"),
            }
        }
        assert!(queue.pop().is_none());
    }
}
