//! Minimal MQTT 3.1.1 broker stand-in for tests: accepts TCP connections and
//! reads and writes raw packets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

pub(crate) const CONNECT: u8 = 1;
pub(crate) const PUBLISH: u8 = 3;
pub(crate) const SUBSCRIBE: u8 = 8;

pub(crate) struct FakeBroker {
	listener: TcpListener,
}

impl FakeBroker {
	pub async fn bind() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		Self { listener }
	}

	pub fn port(&self) -> u16 {
		self.listener.local_addr().unwrap().port()
	}

	/// Accepts the next client connection and reads its CONNECT.
	pub async fn accept(&self) -> BrokerConnection {
		let (stream, _) = time::timeout(Duration::from_secs(10), self.listener.accept())
			.await
			.expect("client connected in time")
			.unwrap();
		let mut connection = BrokerConnection { stream };
		let packet = connection.read_packet().await.expect("CONNECT packet");
		assert_eq!(packet.kind(), CONNECT);
		connection
	}
}

/// Packet read from the client.
#[derive(Debug)]
pub(crate) struct RawPacket {
	pub header: u8,
	pub body: Vec<u8>,
}

impl RawPacket {
	pub fn kind(&self) -> u8 {
		self.header >> 4
	}

	pub fn packet_id(&self) -> u16 {
		u16::from_be_bytes([self.body[0], self.body[1]])
	}

	/// Topic and, for QoS > 0, packet id of a PUBLISH.
	pub fn publish_topic(&self) -> (String, Option<u16>) {
		let len = u16::from_be_bytes([self.body[0], self.body[1]]) as usize;
		let topic = String::from_utf8(self.body[2..2 + len].to_vec()).unwrap();
		let qos = (self.header >> 1) & 0b11;
		let id = (qos > 0)
			.then(|| u16::from_be_bytes([self.body[2 + len], self.body[3 + len]]));
		(topic, id)
	}
}

pub(crate) struct BrokerConnection {
	stream: TcpStream,
}

impl BrokerConnection {
	/// Next packet, or `None` once the client closed the socket.
	pub async fn read_packet(&mut self) -> Option<RawPacket> {
		let header = self.stream.read_u8().await.ok()?;
		let mut length = 0usize;
		let mut shift = 0;
		loop {
			let byte = self.stream.read_u8().await.ok()?;
			length |= ((byte & 0x7f) as usize) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
		}
		let mut body = vec![0; length];
		self.stream.read_exact(&mut body).await.ok()?;
		Some(RawPacket { header, body })
	}

	/// Reads packets until one of `kind` arrives.
	pub async fn read_until(&mut self, kind: u8) -> RawPacket {
		loop {
			let packet = self.read_packet().await.expect("client closed the socket");
			if packet.kind() == kind {
				return packet;
			}
		}
	}

	pub async fn send(&mut self, bytes: &[u8]) {
		self.stream.write_all(bytes).await.unwrap();
	}

	pub async fn send_connack(&mut self, session_present: bool) {
		self.send(&[0x20, 0x02, session_present as u8, 0x00]).await;
	}

	/// CONNACK with return code 5 (not authorized).
	pub async fn refuse(&mut self) {
		self.send(&[0x20, 0x02, 0x00, 0x05]).await;
	}

	pub async fn send_suback(&mut self, packet_id: u16) {
		let [hi, lo] = packet_id.to_be_bytes();
		self.send(&[0x90, 0x03, hi, lo, 0x01]).await;
	}

	pub async fn send_puback(&mut self, packet_id: u16) {
		let [hi, lo] = packet_id.to_be_bytes();
		self.send(&[0x40, 0x02, hi, lo]).await;
	}
}

/// QoS 0 PUBLISH packet.
pub(crate) fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
	let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
	body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
	body.extend_from_slice(topic.as_bytes());
	body.extend_from_slice(payload);

	let mut packet = vec![0x30];
	let mut length = body.len();
	loop {
		let mut byte = (length % 128) as u8;
		length /= 128;
		if length > 0 {
			byte |= 0x80;
		}
		packet.push(byte);
		if length == 0 {
			break;
		}
	}
	packet.extend_from_slice(&body);
	packet
}
