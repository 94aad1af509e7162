// src/core/scanner/testing.rs

//! In-process DNS responders for the scanner tests.

use crate::core::scanner::dns_scanner::DnsProbe;
use hickory_resolver::proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_resolver::proto::rr::rdata::{A, CNAME, NS, SOA};
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn name(raw: &str) -> Name {
    Name::from_ascii(format!("{}.", raw.trim_end_matches('.'))).unwrap()
}

fn normalize(name: &Name) -> String {
    name.to_ascii().trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axfr {
    Allow,
    Refuse,
}

#[derive(Default)]
pub(crate) struct FakeDnsBuilder {
    records: Vec<Record>,
    axfr: Option<(String, Axfr)>,
    delay: Duration,
}

impl FakeDnsBuilder {
    pub fn a(mut self, owner: &str, ip: [u8; 4]) -> Self {
        let rdata = RData::A(A::new(ip[0], ip[1], ip[2], ip[3]));
        self.records.push(Record::from_rdata(name(owner), 300, rdata));
        self
    }

    pub fn cname(mut self, owner: &str, target: &str) -> Self {
        self.records.push(Record::from_rdata(name(owner), 300, RData::CNAME(CNAME(name(target)))));
        self
    }

    pub fn ns(mut self, zone: &str, server: &str) -> Self {
        self.records.push(Record::from_rdata(name(zone), 300, RData::NS(NS(name(server)))));
        self
    }

    /// Holds every UDP answer back for `delay`.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serves `zone` over TCP AXFR, or refuses to.
    pub fn axfr(mut self, zone: &str, mode: Axfr) -> Self {
        self.axfr = Some((zone.to_string(), mode));
        self
    }

    pub async fn spawn(self) -> FakeDns {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let records = Arc::new(self.records);
        let queries = Arc::new(Mutex::new(Vec::new()));
        let delay = self.delay;

        let udp_records = records.clone();
        let udp_queries = queries.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                if let Some(query) = request.queries().first() {
                    udp_queries.lock().unwrap().push(query.query_type());
                }
                let Ok(bytes) = answer(&request, &udp_records).to_vec() else { continue };
                let socket = socket.clone();
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = socket.send_to(&bytes, peer).await;
                });
            }
        });

        let xfr_port = match self.axfr {
            Some((zone, mode)) => Some(spawn_axfr(zone, mode, records.clone()).await),
            None => None,
        };

        FakeDns { addr, xfr_port, queries }
    }
}

pub(crate) struct FakeDns {
    addr: SocketAddr,
    xfr_port: Option<u16>,
    queries: Arc<Mutex<Vec<RecordType>>>,
}

impl FakeDns {
    pub fn builder() -> FakeDnsBuilder {
        FakeDnsBuilder::default()
    }

    pub fn probe(&self) -> DnsProbe {
        DnsProbe::with_nameservers(&[self.addr.ip()], self.addr.port(), Duration::from_millis(500))
    }

    pub fn xfr_port(&self) -> u16 {
        self.xfr_port.expect("fake server was built without AXFR")
    }

    pub fn queries_for(&self, record_type: RecordType) -> usize {
        self.queries.lock().unwrap().iter().filter(|t| **t == record_type).count()
    }
}

fn response_for(request: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_authoritative(true);
    response
}

fn answer(request: &Message, records: &[Record]) -> Message {
    let mut response = response_for(request);
    let Some(query) = request.queries().first() else {
        response.set_response_code(ResponseCode::FormErr);
        return response;
    };
    response.add_query(query.clone());

    let owner = normalize(query.name());
    let known: Vec<&Record> = records.iter().filter(|r| normalize(r.name()) == owner).collect();
    if known.is_empty() {
        response.set_response_code(ResponseCode::NXDomain);
        return response;
    }
    let answers: Vec<Record> = known
        .into_iter()
        .filter(|r| r.record_type() == query.query_type())
        .cloned()
        .collect();
    response.add_answers(answers);
    response
}

async fn spawn_axfr(zone: String, mode: Axfr, records: Arc<Vec<Record>>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let len = match stream.read_u16().await {
                Ok(len) => len as usize,
                Err(_) => continue,
            };
            let mut buf = vec![0u8; len];
            if stream.read_exact(&mut buf).await.is_err() {
                continue;
            }
            let Ok(request) = Message::from_vec(&buf) else { continue };

            let mut response = response_for(&request);
            if let Some(query) = request.queries().first() {
                response.add_query(query.clone());
            }
            match mode {
                Axfr::Refuse => {
                    response.set_response_code(ResponseCode::Refused);
                }
                Axfr::Allow => {
                    let soa = Record::from_rdata(
                        name(&zone),
                        3600,
                        RData::SOA(SOA::new(name(&format!("ns1.{zone}")), name(&format!("hostmaster.{zone}")), 1, 3600, 600, 86400, 300)),
                    );
                    response.add_answer(soa.clone());
                    response.add_answers(records.iter().cloned());
                    response.add_answer(soa);
                }
            }
            if let Ok(bytes) = response.to_vec() {
                let _ = stream.write_u16(bytes.len() as u16).await;
                let _ = stream.write_all(&bytes).await;
            }
        }
    });
    port
}

/// A local UDP port with nothing listening on it.
pub(crate) async fn closed_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap().port()
}

pub(crate) fn localhost() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}
