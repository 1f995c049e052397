// WOL Uplink - Remote Wake
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Wake-on-LAN magic packets.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use tracing::{info, warn};

use crate::models::MacAddress;

/// Length of a magic packet: sync stream plus sixteen MAC repetitions.
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Build the magic packet for `mac`.
pub fn magic_packet(mac: MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFF; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.octets());
    }
    packet
}

/// Puts a magic packet on the wire.
pub trait MagicPacketSender: Send {
    fn send(&mut self, packet: &[u8], target: SocketAddrV4) -> io::Result<()>;
}

/// Sends magic packets over a broadcast-enabled UDP socket.
#[derive(Debug, Default)]
pub struct UdpMagicPacketSender;

impl MagicPacketSender for UdpMagicPacketSender {
    fn send(&mut self, packet: &[u8], target: SocketAddrV4) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        let sent = socket.send_to(packet, target)?;
        if sent != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {} of {} bytes", sent, packet.len()),
            ));
        }
        Ok(())
    }
}

/// Wakes the configured machine.
pub struct RemoteWakeInvoker {
    sender: Box<dyn MagicPacketSender>,
    mac: MacAddress,
    port: u16,
}

impl RemoteWakeInvoker {
    pub fn new(sender: Box<dyn MagicPacketSender>, mac: MacAddress, port: u16) -> Self {
        Self { sender, mac, port }
    }

    /// Send one magic packet to `broadcast`. Never fails past this call.
    pub fn invoke(&mut self, broadcast: Ipv4Addr) -> bool {
        let target = SocketAddrV4::new(broadcast, self.port);
        match self.sender.send(&magic_packet(self.mac), target) {
            Ok(()) => {
                info!("[WOL] Packet sent to {} via {}.", self.mac, target);
                true
            }
            Err(e) => {
                warn!("[WOL] Packet failed to send: {}", e);
                false
            }
        }
    }
}
