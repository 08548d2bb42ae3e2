use automation_lib::{SpeechTranscription, TtsCommand, TtsPriority};
use eyre::{Result, WrapErr};
use std::io::BufRead;
use tokio::sync::mpsc;

/// Fire-and-forget speech output
pub trait Speaker: Send + Sync {
    fn speak(&self, command: TtsCommand);
}

/// Writes every utterance to the log instead of a synthesizer
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, command: TtsCommand) {
        match command.priority {
            TtsPriority::Emergency | TtsPriority::High => {
                tracing::warn!("TTS [{:?}]: {}", command.priority, command.text)
            }
            _ => tracing::info!("TTS: {}", command.text),
        }
    }
}

/// Forwards utterances to a receiver, e.g. a synthesizer task
#[derive(Debug, Clone)]
pub struct ChannelSpeaker {
    tx: mpsc::UnboundedSender<TtsCommand>,
}

impl ChannelSpeaker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TtsCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Speaker for ChannelSpeaker {
    fn speak(&self, command: TtsCommand) {
        if self.tx.send(command).is_err() {
            tracing::debug!("TTS receiver gone, dropping utterance");
        }
    }
}

/// Blocking source of transcribed speech. `Ok(None)` means the input is
/// exhausted.
pub trait SpeechInput: Send {
    fn listen(&mut self) -> Result<Option<SpeechTranscription>>;
}

/// Reads one utterance per line from stdin
#[derive(Debug, Default)]
pub struct StdinSpeechInput;

impl SpeechInput for StdinSpeechInput {
    fn listen(&mut self) -> Result<Option<SpeechTranscription>> {
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .wrap_err("reading utterance from stdin")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(SpeechTranscription::new(line.trim(), 1.0)))
    }
}

/// Replays a fixed list of utterances, then reports end of input
#[derive(Debug, Default)]
pub struct ScriptedSpeechInput {
    lines: std::collections::VecDeque<SpeechTranscription>,
}

impl ScriptedSpeechInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|text| SpeechTranscription::new(text, 1.0))
                .collect(),
        }
    }
}

impl SpeechInput for ScriptedSpeechInput {
    fn listen(&mut self) -> Result<Option<SpeechTranscription>> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_speaker_forwards() {
        let (speaker, mut rx) = ChannelSpeaker::new();
        speaker.speak(TtsCommand::normal("hello"));
        assert_eq!(rx.try_recv().unwrap().text, "hello");
    }

    #[test]
    fn test_scripted_input_ends() {
        let mut input = ScriptedSpeechInput::new(["go home"]);
        assert_eq!(input.listen().unwrap().unwrap().text, "go home");
        assert!(input.listen().unwrap().is_none());
    }
}
