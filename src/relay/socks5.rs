//! SOCKS5 protocol (RFC 1928)
//!
//! Wire-level types plus an incremental parser for the client side of the
//! handshake. The parser consumes byte slices as they arrive from the
//! network and never needs a byte twice, so arbitrarily fragmented reads
//! produce the same result as a single contiguous one.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, ErrorKind},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    str,
};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub use self::consts::{SOCKS5_AUTH_METHOD_NONE, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE};

#[rustfmt::skip]
pub mod consts {
    pub const SOCKS5_VERSION:                          u8 = 0x05;

    pub const SOCKS5_AUTH_METHOD_NONE:                 u8 = 0x00;
    pub const SOCKS5_AUTH_METHOD_GSSAPI:               u8 = 0x01;
    pub const SOCKS5_AUTH_METHOD_PASSWORD:             u8 = 0x02;
    pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE:       u8 = 0xff;

    pub const SOCKS5_CMD_TCP_CONNECT:                  u8 = 0x01;
    pub const SOCKS5_CMD_TCP_BIND:                     u8 = 0x02;
    pub const SOCKS5_CMD_UDP_ASSOCIATE:                u8 = 0x03;

    pub const SOCKS5_ADDR_TYPE_IPV4:                   u8 = 0x01;
    pub const SOCKS5_ADDR_TYPE_DOMAIN_NAME:            u8 = 0x03;
    pub const SOCKS5_ADDR_TYPE_IPV6:                   u8 = 0x04;

    pub const SOCKS5_REPLY_SUCCEEDED:                  u8 = 0x00;
    pub const SOCKS5_REPLY_GENERAL_FAILURE:            u8 = 0x01;
    pub const SOCKS5_REPLY_NETWORK_UNREACHABLE:        u8 = 0x03;
    pub const SOCKS5_REPLY_HOST_UNREACHABLE:           u8 = 0x04;
    pub const SOCKS5_REPLY_CONNECTION_REFUSED:         u8 = 0x05;
    pub const SOCKS5_REPLY_COMMAND_NOT_SUPPORTED:      u8 = 0x07;
    pub const SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;
}

/// One-hot flags for the methods a client advertises. Only NONE is ever
/// consumed; the rest exist so the bitset stays meaningful in traces.
#[rustfmt::skip]
mod method_flags {
    pub const NONE:     u8 = 0x01;
    pub const GSSAPI:   u8 = 0x02;
    pub const PASSWORD: u8 = 0x04;
}

#[rustfmt::skip]
fn method_flag(method: u8) -> u8 {
    match method {
        consts::SOCKS5_AUTH_METHOD_NONE     => method_flags::NONE,
        consts::SOCKS5_AUTH_METHOD_GSSAPI   => method_flags::GSSAPI,
        consts::SOCKS5_AUTH_METHOD_PASSWORD => method_flags::PASSWORD,
        _                                   => 0,
    }
}

/// SOCKS5 reply code
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Reply {
    Succeeded,
    GeneralFailure,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    CommandNotSupported,
    AddressTypeNotSupported,
}

impl Reply {
    #[inline]
    #[rustfmt::skip]
    pub fn as_u8(self) -> u8 {
        match self {
            Reply::Succeeded               => consts::SOCKS5_REPLY_SUCCEEDED,
            Reply::GeneralFailure          => consts::SOCKS5_REPLY_GENERAL_FAILURE,
            Reply::NetworkUnreachable      => consts::SOCKS5_REPLY_NETWORK_UNREACHABLE,
            Reply::HostUnreachable         => consts::SOCKS5_REPLY_HOST_UNREACHABLE,
            Reply::ConnectionRefused       => consts::SOCKS5_REPLY_CONNECTION_REFUSED,
            Reply::CommandNotSupported     => consts::SOCKS5_REPLY_COMMAND_NOT_SUPPORTED,
            Reply::AddressTypeNotSupported => consts::SOCKS5_REPLY_ADDRESS_TYPE_NOT_SUPPORTED,
        }
    }
}

impl Display for Reply {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Reply::Succeeded               => write!(f, "Succeeded"),
            Reply::GeneralFailure          => write!(f, "General failure"),
            Reply::NetworkUnreachable      => write!(f, "Network unreachable"),
            Reply::HostUnreachable         => write!(f, "Host unreachable"),
            Reply::ConnectionRefused       => write!(f, "Connection refused"),
            Reply::CommandNotSupported     => write!(f, "Command not supported"),
            Reply::AddressTypeNotSupported => write!(f, "Address type not supported"),
        }
    }
}

/// SOCKS5 protocol error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("unsupported socks version {0:#x}")]
    UnsupportedSocksVersion(u8),
    #[error("method identification with an empty method list")]
    NoAuthMethods,
    #[error("unsupported command {0:#x}")]
    UnsupportedCommand(u8),
    #[error("address type {0:#x} not supported")]
    AddressTypeNotSupported(u8),
    #[error("address domain name must be UTF-8 encoding")]
    AddressDomainInvalidEncoding,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::IoError(err) => err,
            e => io::Error::new(ErrorKind::InvalidData, e),
        }
    }
}

impl Error {
    /// Convert to `Reply` for responding
    #[rustfmt::skip]
    pub fn as_reply(&self) -> Reply {
        match *self {
            Error::IoError(ref err) => match err.kind() {
                ErrorKind::NetworkUnreachable => Reply::NetworkUnreachable,
                ErrorKind::HostUnreachable    => Reply::HostUnreachable,
                ErrorKind::ConnectionRefused  => Reply::ConnectionRefused,
                _                             => Reply::GeneralFailure,
            },
            Error::UnsupportedCommand(..)       => Reply::CommandNotSupported,
            Error::AddressTypeNotSupported(..)  => Reply::AddressTypeNotSupported,
            Error::UnsupportedSocksVersion(..)
            | Error::NoAuthMethods
            | Error::AddressDomainInvalidEncoding
            | Error::Malformed(..)              => Reply::GeneralFailure,
        }
    }
}

/// SOCKS5 address type
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Socket address (IP Address)
    SocketAddress(SocketAddr),
    /// Domain name address
    DomainNameAddress(String, u16),
}

impl Address {
    /// Writes to buffer
    #[inline]
    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        match *self {
            Address::SocketAddress(SocketAddr::V4(ref addr)) => write_ipv4_address(addr, buf),
            Address::SocketAddress(SocketAddr::V6(ref addr)) => write_ipv6_address(addr, buf),
            Address::DomainNameAddress(ref dnaddr, port) => write_domain_name_address(dnaddr, port, buf),
        }
    }

    /// Get required buffer size for serializing
    #[inline]
    #[rustfmt::skip]
    pub fn serialized_len(&self) -> usize {
        match *self {
            Address::SocketAddress(SocketAddr::V4(..)) => 1 + 4 + 2,
            Address::SocketAddress(SocketAddr::V6(..)) => 1 + 8 * 2 + 2,
            Address::DomainNameAddress(ref dmname, _)  => 1 + 1 + dmname.len() + 2,
        }
    }

    /// Get associated port number
    pub fn port(&self) -> u16 {
        match *self {
            Address::SocketAddress(addr) => addr.port(),
            Address::DomainNameAddress(.., port) => port,
        }
    }
}

impl Debug for Address {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Address::SocketAddress(ref addr) => write!(f, "{addr}"),
            Address::DomainNameAddress(ref addr, ref port) => write!(f, "{addr}:{port}"),
        }
    }
}

impl Display for Address {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Address::SocketAddress(ref addr) => write!(f, "{addr}"),
            Address::DomainNameAddress(ref addr, ref port) => write!(f, "{addr}:{port}"),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(s: SocketAddr) -> Address {
        Address::SocketAddress(s)
    }
}

fn write_ipv4_address<B: BufMut>(addr: &SocketAddrV4, buf: &mut B) {
    buf.put_u8(consts::SOCKS5_ADDR_TYPE_IPV4); // Address type
    buf.put_slice(&addr.ip().octets()); // Ipv4 bytes
    buf.put_u16(addr.port()); // Port
}

fn write_ipv6_address<B: BufMut>(addr: &SocketAddrV6, buf: &mut B) {
    buf.put_u8(consts::SOCKS5_ADDR_TYPE_IPV6); // Address type
    for seg in &addr.ip().segments() {
        buf.put_u16(*seg); // Ipv6 bytes
    }
    buf.put_u16(addr.port()); // Port
}

fn write_domain_name_address<B: BufMut>(dnaddr: &str, port: u16, buf: &mut B) {
    debug_assert!(dnaddr.len() <= u8::MAX as usize);

    buf.put_u8(consts::SOCKS5_ADDR_TYPE_DOMAIN_NAME);
    buf.put_u8(dnaddr.len() as u8);
    buf.put_slice(dnaddr.as_bytes());
    buf.put_u16(port);
}

/// SOCKS5 handshake response packet
///
/// ```plain
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Clone, Debug, Copy)]
pub struct HandshakeResponse {
    pub chosen_method: u8,
}

impl HandshakeResponse {
    /// Creates a handshake response
    pub fn new(cm: u8) -> HandshakeResponse {
        HandshakeResponse { chosen_method: cm }
    }

    /// Write to a writer
    pub async fn write_to<W>(self, w: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        w.write_all(&[consts::SOCKS5_VERSION, self.chosen_method]).await
    }
}

/// TCP response header
///
/// ```plain
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Clone, Debug)]
pub struct TcpResponseHeader {
    /// SOCKS5 reply
    pub reply: Reply,
    /// Reply address
    pub address: Address,
}

impl TcpResponseHeader {
    /// Creates a response header
    pub fn new(reply: Reply, address: Address) -> TcpResponseHeader {
        TcpResponseHeader { reply, address }
    }

    /// Write to a writer
    pub async fn write_to<W>(&self, w: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.write_to_buf(&mut buf);
        w.write_all(&buf).await
    }

    /// Writes to buffer
    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        let TcpResponseHeader { ref reply, ref address } = *self;
        buf.put_slice(&[consts::SOCKS5_VERSION, reply.as_u8(), 0x00]);
        address.write_to_buf(buf);
    }

    /// Length in bytes
    #[inline]
    pub fn serialized_len(&self) -> usize {
        self.address.serialized_len() + 3
    }
}

/// Parser sub-state, one variant per wire field being awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    WantVersion,
    WantNmethods,
    WantMethods,
    WantReqHead,
    WantAtyp,
    WantDstAddr,
    WantDstPort,
    Finish,
}

/// Longest DST.ADDR the wire format can carry (a 255-byte domain name)
const MAX_ADDR_LEN: usize = u8::MAX as usize;

/// Incremental parser for the client greeting and the CONNECT request.
///
/// Feed each entry point with whatever the socket produced; check
/// [`is_finished`](Parser::is_finished) to know whether the message is
/// complete or another read is required. Bytes arriving after the current
/// message is complete are left unconsumed (this server never sees a
/// request pipelined into the greeting read).
///
/// All parsed fields live inline, nothing is allocated.
pub struct Parser {
    state: ParseState,
    /// Countdown of bytes remaining in the field being parsed
    need: usize,
    methods: u8,
    atyp: u8,
    dst_addr: [u8; MAX_ADDR_LEN],
    dst_addr_len: usize,
    dst_port: u16,
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

impl Debug for Parser {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("state", &self.state)
            .field("methods", &self.methods)
            .field("atyp", &self.atyp)
            .field("dst_port", &self.dst_port)
            .finish_non_exhaustive()
    }
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            state: ParseState::WantVersion,
            need: 0,
            methods: 0,
            atyp: 0,
            dst_addr: [0u8; MAX_ADDR_LEN],
            dst_addr_len: 0,
            dst_port: 0,
        }
    }

    /// Whether the message currently being parsed is complete
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == ParseState::Finish
    }

    /// Whether the client advertised the NONE authentication method
    #[inline]
    pub fn has_auth_method_none(&self) -> bool {
        self.methods & method_flags::NONE != 0
    }

    /// Advance through `VER | NMETHODS | METHODS[NMETHODS]`
    pub fn parse_method_identification(&mut self, data: &[u8]) -> Result<(), Error> {
        for &byte in data {
            match self.state {
                ParseState::WantVersion => {
                    if byte != consts::SOCKS5_VERSION {
                        return Err(Error::UnsupportedSocksVersion(byte));
                    }
                    self.state = ParseState::WantNmethods;
                }
                ParseState::WantNmethods => {
                    if byte == 0 {
                        return Err(Error::NoAuthMethods);
                    }
                    self.need = byte as usize;
                    self.state = ParseState::WantMethods;
                }
                ParseState::WantMethods => {
                    self.methods |= method_flag(byte);
                    self.need -= 1;
                    if self.need == 0 {
                        self.state = ParseState::Finish;
                    }
                }
                ParseState::Finish => break,
                _ => return Err(Error::Malformed("greeting bytes in request state")),
            }
        }
        Ok(())
    }

    /// Advance through `VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT`
    pub fn parse_request(&mut self, data: &[u8]) -> Result<(), Error> {
        // A request follows a completed method identification on the same
        // context; a fresh context may also parse a request directly.
        if matches!(self.state, ParseState::Finish | ParseState::WantVersion) {
            self.state = ParseState::WantReqHead;
            self.need = 3;
        }

        for &byte in data {
            match self.state {
                ParseState::WantReqHead => {
                    match self.need {
                        3 => {
                            if byte != consts::SOCKS5_VERSION {
                                return Err(Error::UnsupportedSocksVersion(byte));
                            }
                        }
                        2 => {
                            if byte != consts::SOCKS5_CMD_TCP_CONNECT {
                                return Err(Error::UnsupportedCommand(byte));
                            }
                        }
                        _ => {
                            if byte != 0 {
                                return Err(Error::Malformed("reserved byte must be zero"));
                            }
                        }
                    }
                    self.need -= 1;
                    if self.need == 0 {
                        self.state = ParseState::WantAtyp;
                    }
                }
                ParseState::WantAtyp => {
                    self.atyp = byte;
                    self.dst_addr_len = 0;
                    match byte {
                        consts::SOCKS5_ADDR_TYPE_IPV4 => self.need = 4,
                        consts::SOCKS5_ADDR_TYPE_IPV6 => self.need = 16,
                        // the first DST.ADDR byte carries the name length
                        consts::SOCKS5_ADDR_TYPE_DOMAIN_NAME => self.need = 0,
                        _ => return Err(Error::AddressTypeNotSupported(byte)),
                    }
                    self.state = ParseState::WantDstAddr;
                }
                ParseState::WantDstAddr => {
                    if self.need == 0 {
                        if byte == 0 {
                            return Err(Error::Malformed("empty domain name"));
                        }
                        self.need = byte as usize;
                    } else {
                        self.dst_addr[self.dst_addr_len] = byte;
                        self.dst_addr_len += 1;
                        self.need -= 1;
                        if self.need == 0 {
                            self.state = ParseState::WantDstPort;
                            self.need = 2;
                        }
                    }
                }
                ParseState::WantDstPort => {
                    self.dst_port = (self.dst_port << 8) | u16::from(byte);
                    self.need -= 1;
                    if self.need == 0 {
                        self.state = ParseState::Finish;
                    }
                }
                ParseState::Finish => break,
                _ => return Err(Error::Malformed("request bytes in greeting state")),
            }
        }
        Ok(())
    }

    /// The destination the completed request names
    pub fn address(&self) -> Result<Address, Error> {
        debug_assert!(self.is_finished());

        match self.atyp {
            consts::SOCKS5_ADDR_TYPE_IPV4 => {
                let buf = &self.dst_addr[..4];
                let v4addr = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
                Ok(Address::SocketAddress(SocketAddr::V4(SocketAddrV4::new(
                    v4addr,
                    self.dst_port,
                ))))
            }
            consts::SOCKS5_ADDR_TYPE_IPV6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.dst_addr[..16]);
                let v6addr = Ipv6Addr::from(octets);
                Ok(Address::SocketAddress(SocketAddr::V6(SocketAddrV6::new(
                    v6addr,
                    self.dst_port,
                    0,
                    0,
                ))))
            }
            consts::SOCKS5_ADDR_TYPE_DOMAIN_NAME => {
                match str::from_utf8(&self.dst_addr[..self.dst_addr_len]) {
                    Ok(domain) => Ok(Address::DomainNameAddress(domain.to_owned(), self.dst_port)),
                    Err(..) => Err(Error::AddressDomainInvalidEncoding),
                }
            }
            atyp => Err(Error::AddressTypeNotSupported(atyp)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_greeting(chunks: &[&[u8]]) -> Result<Parser, Error> {
        let mut parser = Parser::new();
        for chunk in chunks {
            parser.parse_method_identification(chunk)?;
        }
        Ok(parser)
    }

    fn parse_request(chunks: &[&[u8]]) -> Result<Parser, Error> {
        let mut parser = Parser::new();
        for chunk in chunks {
            parser.parse_request(chunk)?;
        }
        Ok(parser)
    }

    #[test]
    fn greeting_single_buffer() {
        let parser = parse_greeting(&[&[0x05, 0x01, 0x00]]).unwrap();
        assert!(parser.is_finished());
        assert!(parser.has_auth_method_none());
    }

    #[test]
    fn greeting_multiple_methods() {
        let parser = parse_greeting(&[&[0x05, 0x03, 0x02, 0x01, 0x00]]).unwrap();
        assert!(parser.is_finished());
        assert!(parser.has_auth_method_none());
    }

    #[test]
    fn greeting_without_none_method() {
        let parser = parse_greeting(&[&[0x05, 0x01, 0x02]]).unwrap();
        assert!(parser.is_finished());
        assert!(!parser.has_auth_method_none());
    }

    #[test]
    fn greeting_byte_at_a_time() {
        let parser = parse_greeting(&[&[0x05], &[0x01], &[0x00]]).unwrap();
        assert!(parser.is_finished());
        assert!(parser.has_auth_method_none());
    }

    #[test]
    fn greeting_incomplete_wants_more() {
        let parser = parse_greeting(&[&[0x05, 0x02, 0x00]]).unwrap();
        assert!(!parser.is_finished());
    }

    #[test]
    fn greeting_bad_version() {
        assert!(matches!(
            parse_greeting(&[&[0x04, 0x01, 0x00]]),
            Err(Error::UnsupportedSocksVersion(0x04))
        ));
    }

    #[test]
    fn greeting_zero_nmethods() {
        assert!(matches!(parse_greeting(&[&[0x05, 0x00]]), Err(Error::NoAuthMethods)));
    }

    #[test]
    fn request_ipv4() {
        let parser = parse_request(&[&[0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x09]]).unwrap();
        assert!(parser.is_finished());
        let addr = parser.address().unwrap();
        assert_eq!(addr, Address::SocketAddress("127.0.0.1:9".parse().unwrap()));
    }

    #[test]
    fn request_ipv6() {
        let mut bytes = vec![0x05, 0x01, 0x00, 0x04];
        bytes.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes.extend_from_slice(&[0x1f, 0x90]);

        let parser = parse_request(&[&bytes]).unwrap();
        assert!(parser.is_finished());
        let addr = parser.address().unwrap();
        assert_eq!(addr, Address::SocketAddress("[::1]:8080".parse().unwrap()));
    }

    #[test]
    fn request_domain() {
        let mut bytes = vec![0x05, 0x01, 0x00, 0x03, 11];
        bytes.extend_from_slice(b"example.com");
        bytes.extend_from_slice(&[0x00, 0x50]);

        let parser = parse_request(&[&bytes]).unwrap();
        assert!(parser.is_finished());
        let addr = parser.address().unwrap();
        assert_eq!(addr, Address::DomainNameAddress("example.com".to_owned(), 80));
    }

    #[test]
    fn request_fragmented_matches_single_buffer() {
        // every split point of an IPv4 CONNECT must parse identically
        let bytes = [0x05, 0x01, 0x00, 0x01, 192, 0, 2, 1, 0xab, 0xcd];
        for split in 1..bytes.len() {
            let (head, tail) = bytes.split_at(split);
            let parser = parse_request(&[head, tail]).unwrap();
            assert!(parser.is_finished(), "split at {split}");
            assert_eq!(
                parser.address().unwrap(),
                Address::SocketAddress("192.0.2.1:43981".parse().unwrap()),
                "split at {split}"
            );
        }
    }

    #[test]
    fn request_domain_fragmented() {
        let mut bytes = vec![0x05, 0x01, 0x00, 0x03, 9];
        bytes.extend_from_slice(b"localhost");
        bytes.extend_from_slice(&[0x23, 0x28]);

        for split in 1..bytes.len() {
            let (head, tail) = bytes.split_at(split);
            let parser = parse_request(&[head, tail]).unwrap();
            assert!(parser.is_finished(), "split at {split}");
            assert_eq!(
                parser.address().unwrap(),
                Address::DomainNameAddress("localhost".to_owned(), 9000),
                "split at {split}"
            );
        }
    }

    #[test]
    fn request_after_greeting_reuses_context() {
        let mut parser = parse_greeting(&[&[0x05, 0x01, 0x00]]).unwrap();
        assert!(parser.is_finished());

        parser
            .parse_request(&[0x05, 0x01, 0x00, 0x01, 10, 0, 0, 1, 0x00, 0x50])
            .unwrap();
        assert!(parser.is_finished());
        assert_eq!(
            parser.address().unwrap(),
            Address::SocketAddress("10.0.0.1:80".parse().unwrap())
        );
    }

    #[test]
    fn request_unsupported_command() {
        // BIND
        let err = parse_request(&[&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCommand(0x02)));
        assert_eq!(err.as_reply(), Reply::CommandNotSupported);
    }

    #[test]
    fn request_bad_atyp() {
        let err = parse_request(&[&[0x05, 0x01, 0x00, 0x05]]).unwrap_err();
        assert!(matches!(err, Error::AddressTypeNotSupported(0x05)));
        assert_eq!(err.as_reply(), Reply::AddressTypeNotSupported);
    }

    #[test]
    fn request_bad_version() {
        assert!(matches!(
            parse_request(&[&[0x04, 0x01, 0x00]]),
            Err(Error::UnsupportedSocksVersion(0x04))
        ));
    }

    #[test]
    fn request_nonzero_reserved() {
        assert!(matches!(
            parse_request(&[&[0x05, 0x01, 0x01]]),
            Err(Error::Malformed(..))
        ));
    }

    #[test]
    fn request_port_is_big_endian() {
        let parser = parse_request(&[&[0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x1f, 0x90]]).unwrap();
        assert_eq!(parser.address().unwrap().port(), 8080);
    }

    #[test]
    fn response_header_ipv4_wire_format() {
        let header = TcpResponseHeader::new(
            Reply::Succeeded,
            Address::SocketAddress("127.0.0.1:8789".parse().unwrap()),
        );
        let mut buf = BytesMut::new();
        header.write_to_buf(&mut buf);
        // BND.PORT must be network byte order
        assert_eq!(&buf[..], &[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x22, 0x55]);
    }

    #[test]
    fn response_header_error_template() {
        let header = TcpResponseHeader::new(
            Reply::CommandNotSupported,
            Address::SocketAddress(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0)),
        );
        let mut buf = BytesMut::new();
        header.write_to_buf(&mut buf);
        assert_eq!(&buf[..], &[0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }
}
