// ABOUTME: RPC shape classification from the two streaming flags.
// ABOUTME: The shape decides which adapter logic is emitted for a method.

use std::fmt;

/// Streaming shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Unary,
    ServerStreaming,
    ClientStreaming,
    Bidirectional,
}

impl Shape {
    /// Classify a method from its request and response streaming flags.
    pub fn classify(request_streaming: bool, response_streaming: bool) -> Self {
        match (request_streaming, response_streaming) {
            (false, false) => Shape::Unary,
            (false, true) => Shape::ServerStreaming,
            (true, false) => Shape::ClientStreaming,
            (true, true) => Shape::Bidirectional,
        }
    }

    pub fn is_streaming(self) -> bool {
        self != Shape::Unary
    }

    /// Whether the served call answers with a stream of messages.
    pub fn streams_responses(self) -> bool {
        matches!(self, Shape::ServerStreaming | Shape::Bidirectional)
    }

    /// Whether the served call receives a stream of messages.
    pub fn streams_requests(self) -> bool {
        matches!(self, Shape::ClientStreaming | Shape::Bidirectional)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Unary => "unary",
            Shape::ServerStreaming => "server-streaming",
            Shape::ClientStreaming => "client-streaming",
            Shape::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_all_four_shapes() {
        assert_eq!(Shape::classify(false, false), Shape::Unary);
        assert_eq!(Shape::classify(false, true), Shape::ServerStreaming);
        assert_eq!(Shape::classify(true, false), Shape::ClientStreaming);
        assert_eq!(Shape::classify(true, true), Shape::Bidirectional);
    }

    #[test]
    fn test_stream_directions() {
        assert!(!Shape::Unary.is_streaming());
        assert!(Shape::ServerStreaming.streams_responses());
        assert!(!Shape::ServerStreaming.streams_requests());
        assert!(Shape::ClientStreaming.streams_requests());
        assert!(
            Shape::Bidirectional.streams_requests() && Shape::Bidirectional.streams_responses()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::Bidirectional.to_string(), "bidirectional");
    }
}
