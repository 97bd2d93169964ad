/// One parsed probe-request observation.
///
/// Records are append-only: once written into a slot they are never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Transmitter hardware address.
    pub mac: [u8; 6],
    /// Requested network name, possibly empty.
    pub ssid: String,
    /// Capture time, whole seconds since the Unix epoch.
    pub captured_at: i64,
    /// MD5 over the frame body minus the FCS trailer.
    pub fingerprint: [u8; 16],
    /// Received signal strength indicator.
    pub rssi: i8,
    /// 12-bit sequence number, 0..=4095.
    pub sequence: u16,
    /// Optional HT capability info bytes.
    pub ht_capabilities: Option<[u8; 2]>,
}

impl Record {
    pub fn mac_string(&self) -> String {
        let m = &self.mac;
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    pub fn ht_hex(&self) -> String {
        match self.ht_capabilities {
            Some([a, b]) => format!("{a:02x}{b:02x}"),
            None => String::new(),
        }
    }

    /// The journal/uplink line for this record:
    /// `mm:mm:mm:mm:mm:mm SSID EPOCH HASH RSSI SN HTCI`.
    ///
    /// An absent HT field leaves a trailing space, matching the on-wire
    /// format consumers already parse.
    pub fn wire_line(&self) -> String {
        format!(
            "{} {} {} {} {:02} {} {}",
            self.mac_string(),
            self.ssid,
            self.captured_at,
            self.fingerprint_hex(),
            self.rssi,
            self.sequence,
            self.ht_hex()
        )
    }
}
