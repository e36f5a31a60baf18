//! Card transport contract
//!
//! The transport exchanges raw byte frames with a card over a half-duplex
//! channel. Transmission is blocking; timeouts are the transport's concern,
//! not the caller's. The batch entry point preserves submission order and
//! returns one response per request; callers are expected to verify the
//! counts match before interpreting anything.

use std::fmt;

use bytes::Bytes;
use tracing::trace;

/// Errors raised by a card transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The physical channel was lost mid-exchange
    #[error("communication channel lost: {0}")]
    ChannelLost(&'static str),

    /// The card did not answer
    #[error("no response from card")]
    NoResponse,

    /// Transport-specific failure
    #[error("transport failure: {0}")]
    Other(&'static str),
}

/// Blocking byte-level transport to a smart card
pub trait CardTransport: fmt::Debug {
    /// Transmit a single request frame and return the raw response frame
    fn transmit(&mut self, request: &[u8]) -> Result<Bytes, TransportError>;

    /// Transmit an ordered batch of request frames
    ///
    /// The default implementation loops over [`CardTransport::transmit`];
    /// implementations backed by a batching channel may override it. The
    /// returned vector preserves request order but is not guaranteed by the
    /// contract to have the same length as `requests` — callers must check.
    fn transmit_batch(&mut self, requests: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            trace!(request = %hex::encode_upper(request), "transmitting frame");
            let response = self.transmit(request)?;
            trace!(response = %hex::encode_upper(&response), "received frame");
            responses.push(response);
        }
        Ok(responses)
    }

    /// Release the channel and reset the transport state
    fn reset(&mut self) -> Result<(), TransportError>;
}

/// Scripted transport for tests
///
/// Responses are played back in the order they were queued; transmitted
/// requests are recorded for assertion. An empty queue yields
/// [`TransportError::NoResponse`].
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: std::collections::VecDeque<Bytes>,
    requests: Vec<Bytes>,
    /// When set, `transmit_batch` drops this many trailing responses,
    /// simulating a desynchronized lower layer.
    short_batch_by: usize,
}

impl MockTransport {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers every request with the same frame
    pub fn with_response(response: impl Into<Bytes>) -> Self {
        let mut mock = Self::new();
        mock.queue_response(response);
        mock
    }

    /// Queue one response frame
    pub fn queue_response(&mut self, response: impl Into<Bytes>) -> &mut Self {
        self.responses.push_back(response.into());
        self
    }

    /// Make subsequent batches return `n` fewer responses than requests
    pub fn drop_trailing_responses(&mut self, n: usize) -> &mut Self {
        self.short_batch_by = n;
        self
    }

    /// Requests transmitted so far
    pub fn transmitted(&self) -> &[Bytes] {
        &self.requests
    }
}

impl CardTransport for MockTransport {
    fn transmit(&mut self, request: &[u8]) -> Result<Bytes, TransportError> {
        self.requests.push(Bytes::copy_from_slice(request));
        self.responses.pop_front().ok_or(TransportError::NoResponse)
    }

    fn transmit_batch(&mut self, requests: &[Bytes]) -> Result<Vec<Bytes>, TransportError> {
        let keep = requests.len().saturating_sub(self.short_batch_by);
        let mut responses = Vec::with_capacity(keep);
        for (i, request) in requests.iter().enumerate() {
            let response = self.transmit(request)?;
            if i < keep {
                responses.push(response);
            }
        }
        Ok(responses)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.responses.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_mock_scripted_responses() {
        let mut transport = MockTransport::new();
        transport
            .queue_response(hex!("9000").to_vec())
            .queue_response(hex!("6A82").to_vec());

        assert_eq!(
            transport.transmit(&hex!("00B2013C00")).unwrap().as_ref(),
            hex!("9000")
        );
        assert_eq!(
            transport.transmit(&hex!("00B2023C00")).unwrap().as_ref(),
            hex!("6A82")
        );
        assert!(matches!(
            transport.transmit(&hex!("00B2033C00")),
            Err(TransportError::NoResponse)
        ));
        assert_eq!(transport.transmitted().len(), 3);
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut transport = MockTransport::new();
        transport
            .queue_response(hex!("AA9000").to_vec())
            .queue_response(hex!("BB9000").to_vec());

        let requests = vec![
            Bytes::from_static(&hex!("00B2013C00")),
            Bytes::from_static(&hex!("00B2023C00")),
        ];
        let responses = transport.transmit_batch(&requests).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].as_ref(), hex!("AA9000"));
        assert_eq!(responses[1].as_ref(), hex!("BB9000"));
    }

    #[test]
    fn test_batch_can_come_back_short() {
        let mut transport = MockTransport::new();
        transport
            .queue_response(hex!("9000").to_vec())
            .queue_response(hex!("9000").to_vec())
            .queue_response(hex!("9000").to_vec())
            .drop_trailing_responses(1);

        let requests = vec![
            Bytes::from_static(&hex!("00B2013C00")),
            Bytes::from_static(&hex!("00B2023C00")),
            Bytes::from_static(&hex!("00B2033C00")),
        ];
        let responses = transport.transmit_batch(&requests).unwrap();
        assert_eq!(responses.len(), 2);
    }
}
