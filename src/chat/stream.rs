use crate::models::api::ChatReply;
use crate::models::chat::{ Reference, SessionId };
use futures::{ Future, Stream };
use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Slice size (in characters) and inter-slice delay bounds for the typewriter replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypewriterConfig {
    pub min_slice: usize,
    pub max_slice: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            min_slice: 1,
            max_slice: 4,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(30),
        }
    }
}

/// How a complete answer is handed to the message store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Typewriter(TypewriterConfig),
    Whole,
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Typewriter(TypewriterConfig::default())
    }
}

impl Delivery {
    pub fn stream(&self, answer: String) -> ChunkStream {
        match self {
            Delivery::Typewriter(config) => typewriter_stream(answer, *config),
            Delivery::Whole => full_response_as_stream(answer),
        }
    }
}

/// An answer in flight: metadata up front, text as a stream of slices.
pub struct ReplyStream {
    pub session_id: Option<SessionId>,
    pub references: Vec<Reference>,
    pub chunks: ChunkStream,
}

impl ReplyStream {
    pub fn replay(reply: ChatReply, delivery: &Delivery) -> Self {
        Self {
            session_id: reply.session_id,
            references: reply.references,
            chunks: delivery.stream(reply.answer),
        }
    }
}

/// Cuts `text` into slices of `min_slice..=max_slice` characters, each paired
/// with the pause to take after emitting it.
pub fn segment<R: Rng>(text: &str, config: &TypewriterConfig, rng: &mut R) -> Vec<(String, Duration)> {
    let min_slice = config.min_slice.max(1);
    let max_slice = config.max_slice.max(min_slice);
    let (min_delay, max_delay) = if config.max_delay >= config.min_delay {
        (config.min_delay, config.max_delay)
    } else {
        (config.max_delay, config.min_delay)
    };

    let chars: Vec<char> = text.chars().collect();
    let mut slices = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let size = rng.gen_range(min_slice..=max_slice);
        let end = (index + size).min(chars.len());
        let slice: String = chars[index..end].iter().collect();
        let delay = rng.gen_range(min_delay..=max_delay);
        slices.push((slice, delay));
        index = end;
    }
    slices
}

pub fn create_chunk_stream<F, Fut>(producer: F) -> ChunkStream
    where F: FnOnce(mpsc::Sender<String>) -> Fut + Send + 'static, Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn typewriter_stream(answer: String, config: TypewriterConfig) -> ChunkStream {
    let slices = segment(&answer, &config, &mut StdRng::from_entropy());
    create_chunk_stream(move |tx| async move {
        for (slice, delay) in slices {
            // A closed channel means the consumer stopped listening.
            if tx.send(slice).await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
        }
    })
}

pub fn full_response_as_stream(answer: String) -> ChunkStream {
    create_chunk_stream(move |tx| async move {
        if !answer.is_empty() {
            let _ = tx.send(answer).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn segments_cover_text_in_bounded_slices() {
        let config = TypewriterConfig::default();
        let text = "Fundamental rights are guaranteed by Part III of the Constitution.";
        let mut rng = StdRng::seed_from_u64(7);
        let slices = segment(text, &config, &mut rng);

        let joined: String = slices.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(joined, text);
        for (slice, delay) in &slices {
            let n = slice.chars().count();
            assert!((1..=4).contains(&n), "slice of {} chars", n);
            assert!(*delay >= config.min_delay && *delay <= config.max_delay);
        }
    }

    #[test]
    fn segments_never_split_a_character() {
        let text = "समानता और स्वतंत्रता";
        let mut rng = StdRng::seed_from_u64(3);
        let slices = segment(text, &TypewriterConfig::default(), &mut rng);
        let joined: String = slices.into_iter().map(|(s, _)| s).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn empty_text_yields_no_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(segment("", &TypewriterConfig::default(), &mut rng).is_empty());
    }

    #[tokio::test]
    async fn typewriter_stream_reassembles_answer() {
        let config = TypewriterConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::from_millis(1),
            ..TypewriterConfig::default()
        };
        let chunks: Vec<String> = typewriter_stream("Explain Article 21".into(), config).collect().await;
        assert!(chunks.len() >= 5);
        assert_eq!(chunks.concat(), "Explain Article 21");
    }

    #[tokio::test]
    async fn whole_delivery_is_one_chunk() {
        let chunks: Vec<String> = Delivery::Whole.stream("How to file an RTI?".into()).collect().await;
        assert_eq!(chunks, vec!["How to file an RTI?".to_string()]);
    }
}
