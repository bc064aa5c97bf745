// # DNS who-am-I IP Source
//
// This crate provides an IP source that learns the host's public IPv4
// address from a DNS resolver.
//
// ## How it works
//
// Cloudflare's public resolver answers a TXT query in the CHAOS class for
// `whoami.cloudflare.` with the address the query came from. One UDP
// exchange is enough; if the answer comes back truncated the same query is
// repeated once over TCP.
//
// ## Constraints
//
// - No retry on failure: the scheduler fails fast and an outer supervisor
//   restarts the process
// - Stray datagrams (wrong source or id) are skipped until the timeout
// - No background tasks
// - Every failure is `Error::Discovery`

use async_trait::async_trait;
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::Instant;
use tracing::debug;

/// Resolver that implements the who-am-I answer (Cloudflare 1.1.1.1)
pub const DEFAULT_RESOLVER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

/// Name queried for the caller's address
pub const DEFAULT_QUERY_NAME: &str = "whoami.cloudflare.";

/// Per-exchange timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum UDP DNS response size
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// IP source backed by a DNS who-am-I query
#[derive(Debug, Clone)]
pub struct WhoamiIpSource {
    /// Resolver to ask
    resolver: SocketAddr,

    /// Fully-qualified name to query
    query_name: String,

    /// Timeout for each network exchange
    timeout: Duration,
}

impl WhoamiIpSource {
    /// Create a source using Cloudflare's resolver and query name
    pub fn new() -> Self {
        Self {
            resolver: DEFAULT_RESOLVER,
            query_name: DEFAULT_QUERY_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Ask a different resolver
    pub fn with_resolver(mut self, resolver: SocketAddr) -> Self {
        self.resolver = resolver;
        self
    }

    /// Query a different name
    pub fn with_query_name(mut self, name: &str) -> Result<Self> {
        Name::from_str(name)
            .map_err(|e| Error::config(format!("invalid who-am-I query name '{}': {}", name, e)))?;
        self.query_name = name.to_string();
        Ok(self)
    }

    /// Change the per-exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the TXT/CH query with recursion desired
    fn build_query(&self) -> Result<Message> {
        let mut query = Query::query(parse_name(&self.query_name)?, RecordType::TXT);
        query.set_query_class(DNSClass::CH);

        let mut message = Message::new();
        message
            .set_id(rand::random::<u16>())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(query);
        Ok(message)
    }

    /// One UDP exchange; datagrams from other sources or with another id are skipped
    async fn exchange_udp(&self, query: &[u8], id: u16) -> Result<Vec<u8>> {
        let bind_addr = if self.resolver.is_ipv6() {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::discovery(format!("failed to bind UDP socket: {}", e)))?;

        socket
            .send_to(query, self.resolver)
            .await
            .map_err(|e| Error::discovery(format!("failed to send DNS query to {}: {}", self.resolver, e)))?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let (len, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    return Err(Error::discovery(format!("failed to receive DNS response: {}", e)));
                }
                Err(_) => {
                    return Err(Error::discovery(format!(
                        "DNS query to {} timed out after {:?}",
                        self.resolver, self.timeout
                    )));
                }
            };

            if from != self.resolver {
                debug!(%from, "ignoring datagram from unexpected source");
                continue;
            }
            if len < 2 || u16::from_be_bytes([buf[0], buf[1]]) != id {
                debug!(%from, "ignoring DNS response with mismatched id");
                continue;
            }

            buf.truncate(len);
            return Ok(buf);
        }
    }

    async fn exchange_tcp(&self, query: &[u8]) -> Result<Vec<u8>> {
        let exchange = async {
            let mut stream = TcpStream::connect(self.resolver).await?;

            let len = u16::try_from(query.len()).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "DNS query too large")
            })?;
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(query).await?;

            let mut len_buf = [0u8; 2];
            stream.read_exact(&mut len_buf).await?;
            let mut response = vec![0u8; u16::from_be_bytes(len_buf) as usize];
            stream.read_exact(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(Error::discovery(format!("DNS over TCP to {} failed: {}", self.resolver, e))),
            Err(_) => Err(Error::discovery(format!(
                "DNS query over TCP to {} timed out after {:?}",
                self.resolver, self.timeout
            ))),
        }
    }
}

impl Default for WhoamiIpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpSource for WhoamiIpSource {
    async fn discover(&self) -> Result<Ipv4Addr> {
        let query = self.build_query()?;
        let query_bytes = query
            .to_vec()
            .map_err(|e| Error::discovery(format!("failed to encode DNS query: {}", e)))?;

        debug!(resolver = %self.resolver, name = %self.query_name, "sending who-am-I query");

        let mut response = decode(&self.exchange_udp(&query_bytes, query.id()).await?)?;
        if response.truncated() {
            debug!("UDP answer truncated, retrying over TCP");
            response = decode(&self.exchange_tcp(&query_bytes).await?)?;
        }

        if response.id() != query.id() {
            return Err(Error::discovery(format!(
                "DNS response id {} does not match query id {}",
                response.id(),
                query.id()
            )));
        }

        parse_address(&response)
    }

    fn source_name(&self) -> &'static str {
        "dns-whoami"
    }
}

fn parse_name(name: &str) -> Result<Name> {
    Name::from_str(name)
        .map_err(|e| Error::discovery(format!("invalid who-am-I query name '{}': {}", name, e)))
}

fn decode(bytes: &[u8]) -> Result<Message> {
    Message::from_vec(bytes).map_err(|e| Error::discovery(format!("invalid DNS response: {}", e)))
}

/// Read the address out of the first answer's first TXT string
pub fn parse_address(response: &Message) -> Result<Ipv4Addr> {
    if response.response_code() != ResponseCode::NoError {
        return Err(Error::discovery(format!(
            "resolver answered {}",
            response.response_code()
        )));
    }

    let answer = response
        .answers()
        .first()
        .ok_or_else(|| Error::discovery("DNS response contains no answer"))?;

    let RData::TXT(txt) = answer.data() else {
        return Err(Error::discovery(format!(
            "expected a TXT answer, got {}",
            answer.record_type()
        )));
    };

    let first = txt
        .txt_data()
        .first()
        .ok_or_else(|| Error::discovery("TXT answer is empty"))?;
    let text = String::from_utf8_lossy(first);

    text.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| Error::discovery(format!("could not determine IP address: {}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::Record;
    use hickory_proto::rr::rdata::{A, TXT};

    fn response_with(rdata: RData) -> Message {
        let mut message = Message::new();
        message
            .set_id(7)
            .set_message_type(MessageType::Response)
            .set_response_code(ResponseCode::NoError);
        let mut record = Record::from_rdata(Name::from_ascii(DEFAULT_QUERY_NAME).unwrap(), 0, rdata);
        record.set_dns_class(DNSClass::CH);
        message.add_answer(record);
        message
    }

    #[test]
    fn test_query_is_txt_chaos_with_recursion() {
        let message = WhoamiIpSource::new().build_query().unwrap();

        assert!(message.recursion_desired());
        assert_eq!(message.message_type(), MessageType::Query);
        assert_eq!(message.queries().len(), 1);

        let query = &message.queries()[0];
        assert_eq!(query.query_type(), RecordType::TXT);
        assert_eq!(query.query_class(), DNSClass::CH);
        assert_eq!(query.name().to_ascii(), DEFAULT_QUERY_NAME);
    }

    #[test]
    fn test_parse_address_from_txt() {
        let response = response_with(RData::TXT(TXT::new(vec!["203.0.113.7".to_string()])));
        assert_eq!(parse_address(&response).unwrap(), Ipv4Addr::new(203, 0, 113, 7));
    }

    #[test]
    fn test_non_ip_payload_is_discovery_error() {
        let response = response_with(RData::TXT(TXT::new(vec!["not-an-ip".to_string()])));
        let err = parse_address(&response).unwrap_err();
        assert!(matches!(err, Error::Discovery(ref m) if m.contains("not-an-ip")));
    }

    #[test]
    fn test_ipv6_payload_is_rejected() {
        let response = response_with(RData::TXT(TXT::new(vec!["2001:db8::1".to_string()])));
        assert!(matches!(parse_address(&response), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_empty_answer_is_discovery_error() {
        let mut message = Message::new();
        message.set_message_type(MessageType::Response);
        assert!(matches!(parse_address(&message), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_non_txt_answer_is_rejected() {
        let response = response_with(RData::A(A(Ipv4Addr::new(203, 0, 113, 7))));
        assert!(matches!(parse_address(&response), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_error_rcode_is_rejected() {
        let mut response = response_with(RData::TXT(TXT::new(vec!["203.0.113.7".to_string()])));
        response.set_response_code(ResponseCode::Refused);
        assert!(matches!(parse_address(&response), Err(Error::Discovery(_))));
    }

    #[test]
    fn test_with_query_name_rejects_garbage() {
        let long_label = format!("{}.example.", "a".repeat(64));
        assert!(WhoamiIpSource::new().with_query_name(&long_label).is_err());
        assert!(WhoamiIpSource::new().with_query_name("whoami.example.").is_ok());
    }
}
