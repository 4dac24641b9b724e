//! Protobuf wire schema.
//!
//! Hand-maintained equivalent of:
//!
//! ```text
//! message WirePacket {
//!   string from_node = 1;
//!   optional string to_node = 2;
//!   oneof variant {
//!     NodeInfo node_info = 10;
//!     TextMessage text_message = 11;
//!     NetworkHealth network_health = 12;
//!     CotMessage cot_message = 13;
//!     HealthCheckRequest health_check_request = 14;
//!     HealthCheckResponse health_check_response = 15;
//!     EncryptedEnvelope encrypted_envelope = 16;
//!   }
//! }
//! ```
//!
//! Tags are part of the cross-node contract and must never be renumbered.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WirePacket {
    #[prost(string, tag = "1")]
    pub from_node: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "2")]
    pub to_node: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(oneof = "wire_packet::Variant", tags = "10, 11, 12, 13, 14, 15, 16")]
    pub variant: ::core::option::Option<wire_packet::Variant>,
}

pub mod wire_packet {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "10")]
        NodeInfo(super::NodeInfo),
        #[prost(message, tag = "11")]
        TextMessage(super::TextMessage),
        #[prost(message, tag = "12")]
        NetworkHealth(super::NetworkHealth),
        #[prost(message, tag = "13")]
        CotMessage(super::CotMessage),
        #[prost(message, tag = "14")]
        HealthCheckRequest(super::HealthCheckRequest),
        #[prost(message, tag = "15")]
        HealthCheckResponse(super::HealthCheckResponse),
        #[prost(message, tag = "16")]
        EncryptedEnvelope(super::EncryptedEnvelope),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    #[prost(string, tag = "1")]
    pub callsign: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub node_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextMessage {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetworkHealth {
    #[prost(sint32, tag = "1")]
    pub rssi: i32,
    #[prost(float, tag = "2")]
    pub snr: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CotMessage {
    #[prost(string, tag = "1")]
    pub xml: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {
    #[prost(uint64, tag = "1")]
    pub sent_at: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(uint64, tag = "1")]
    pub echoed_at: u64,
    #[prost(sint32, tag = "2")]
    pub rssi: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EncryptedEnvelope {
    #[prost(bytes = "vec", tag = "1")]
    pub nonce: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub ciphertext: ::prost::alloc::vec::Vec<u8>,
}
