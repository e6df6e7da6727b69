//! UDS message containers
//!
//! The client does not interpret UDS data beyond the pending-response
//! indicator; these types only carry the raw service bytes and the
//! addressing the DoIP layer needs.

/// A UDS request as supplied by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsRequest {
    payload: Vec<u8>,
}

impl UdsRequest {
    /// Creates a request from raw UDS bytes (service id first)
    pub fn new<P: Into<Vec<u8>>>(payload: P) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Creates a request from a service id and its parameters
    pub fn from_sid(sid: u8, args: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(args.len() + 1);
        payload.push(sid);
        payload.extend_from_slice(args);
        Self { payload }
    }

    /// The raw UDS bytes of this request
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A UDS response as returned by an ECU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsResponse {
    /// Logical address of the responding ECU
    pub source_address: u16,
    /// Logical address of the tester the response is for
    pub target_address: u16,
    /// The raw UDS bytes of the response
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_construction() {
        let request = UdsRequest::from_sid(0x22, &[0xF1, 0x90]);
        assert_eq!(request.payload(), &[0x22, 0xF1, 0x90]);
        let request = UdsRequest::new(vec![0x10, 0x03]);
        assert_eq!(request.payload(), &[0x10, 0x03]);
    }
}
