//! Header records: the parsed per-message state that gets cached
//!
//! Everything here is plain owned data. Intra-record references (the
//! "real subject" inside the subject line) are stored as offsets, so a
//! record can be flattened and rebuilt without pointer fix-ups.

use serde::{Deserialize, Deserializer, Serialize};
use std::cell::Cell;

/// Deepest MIME nesting a record may carry, counting the root part as 1
pub const MAX_BODY_DEPTH: usize = 64;

/// Per-message status flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(u32);

impl MessageFlags {
    pub const NEW: Self = Self(1 << 0);
    pub const OLD: Self = Self(1 << 1);
    pub const READ: Self = Self(1 << 2);
    pub const REPLIED: Self = Self(1 << 3);
    pub const FLAGGED: Self = Self(1 << 4);
    pub const DELETED: Self = Self(1 << 5);
    pub const TAGGED: Self = Self(1 << 6);
    pub const EXPIRED: Self = Self(1 << 7);
    pub const SUPERSEDED: Self = Self(1 << 8);
    pub const TRASHED: Self = Self(1 << 9);

    const ALL: u32 = (1 << 10) - 1;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits, dropping unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A single mailbox or group marker in an address list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub personal: Option<String>,
    pub mailbox: Option<String>,
    /// Start or end of an RFC 5322 group
    pub group: bool,
}

impl Address {
    pub fn new(personal: Option<&str>, mailbox: &str) -> Self {
        Self {
            personal: personal.map(str::to_string),
            mailbox: Some(mailbox.to_string()),
            group: false,
        }
    }
}

/// Parsed RFC 5322 envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub return_path: Vec<Address>,
    pub from: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub mail_followup_to: Vec<Address>,
    pub list_post: Option<String>,
    pub subject: Option<String>,
    /// Byte offset into `subject` past any reply prefix
    pub real_subject_offset: Option<u32>,
    pub message_id: Option<String>,
    pub supersedes: Option<String>,
    pub date: Option<String>,
    pub x_label: Option<String>,
    pub spam: Option<String>,
    pub references: Vec<String>,
    pub in_reply_to: Vec<String>,
    pub user_headers: Vec<String>,
}

impl Envelope {
    /// Set the subject and locate the real subject behind `Re:`/`Fwd:` prefixes
    pub fn set_subject(&mut self, subject: &str) {
        let offset = reply_prefix_len(subject);
        self.subject = Some(subject.to_string());
        self.real_subject_offset = if offset > 0 {
            u32::try_from(offset).ok()
        } else {
            None
        };
    }

    /// Subject with reply prefixes stripped
    pub fn real_subject(&self) -> Option<&str> {
        let subject = self.subject.as_deref()?;
        match self.real_subject_offset {
            Some(offset) => subject.get(offset as usize..),
            None => Some(subject),
        }
    }

    /// Check that intra-record offsets point inside their fields
    pub fn is_consistent(&self) -> bool {
        match (self.real_subject_offset, self.subject.as_deref()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(offset), Some(subject)) => subject.is_char_boundary(offset as usize),
        }
    }
}

fn reply_prefix_len(subject: &str) -> usize {
    const PREFIXES: [&str; 4] = ["re:", "fw:", "fwd:", "aw:"];

    let mut consumed = 0;
    loop {
        let rest = &subject[consumed..];
        let trimmed = rest.trim_start();
        let lower = trimmed.to_ascii_lowercase();
        match PREFIXES.iter().find(|p| lower.starts_with(*p)) {
            Some(prefix) => consumed += rest.len() - trimmed.len() + prefix.len(),
            None => {
                if consumed > 0 {
                    consumed += rest.len() - trimmed.len();
                }
                return consumed;
            }
        }
    }
}

/// MIME top-level media type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Text,
    Multipart,
    Application,
    Message,
    Image,
    Audio,
    Video,
    Model,
    Other,
}

/// Content-Transfer-Encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
    Binary,
    UuEncoded,
    Other,
}

/// Content-Disposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
    FormData,
}

/// A MIME parameter such as `charset=utf-8`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub attribute: String,
    pub value: String,
}

impl Parameter {
    pub fn new(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

/// A node of the MIME structure; multipart bodies nest their `parts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub content_type: ContentType,
    pub subtype: Option<String>,
    pub encoding: TransferEncoding,
    pub disposition: Disposition,
    pub parameters: Vec<Parameter>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub form_name: Option<String>,
    pub xtype: Option<String>,
    /// Offset of the body in the message source
    pub offset: u64,
    pub length: u64,
    pub header_offset: u64,
    #[serde(deserialize_with = "deserialize_parts")]
    pub parts: Vec<Body>,
}

impl Body {
    /// Look up a parameter by case-insensitive attribute name
    pub fn parameter(&self, attribute: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.attribute.eq_ignore_ascii_case(attribute))
            .map(|p| p.value.as_str())
    }

    /// Number of nodes in this subtree, including self
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(body) = pending.pop() {
            count += 1;
            pending.extend(&body.parts);
        }
        count
    }

    /// Nesting levels in this subtree, 1 for a leaf
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((body, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(body.parts.iter().map(|part| (part, level + 1)));
        }
        deepest
    }
}

thread_local! {
    static PARTS_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Restores the nesting counter when a level of `parts` is done
struct DepthGuard;

impl Drop for DepthGuard {
    fn drop(&mut self) {
        PARTS_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Deserialize nested parts, refusing trees deeper than `MAX_BODY_DEPTH`
/// before the recursion can exhaust the stack
fn deserialize_parts<'de, D>(deserializer: D) -> Result<Vec<Body>, D::Error>
where
    D: Deserializer<'de>,
{
    let level = PARTS_DEPTH.with(|depth| {
        depth.set(depth.get() + 1);
        depth.get()
    });
    let _guard = DepthGuard;

    // `level` is the depth of the body owning these parts
    if level > MAX_BODY_DEPTH {
        return Err(serde::de::Error::custom(format!(
            "MIME structure nested deeper than {MAX_BODY_DEPTH} levels"
        )));
    }

    Vec::<Body>::deserialize(deserializer)
}

/// The cached state of one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub flags: MessageFlags,
    /// Sent date, seconds since the UNIX epoch
    pub date_sent: i64,
    /// Sender's zone offset, seconds east of UTC
    pub zone_offset: i32,
    /// Received date, seconds since the UNIX epoch
    pub received: i64,
    pub offset: u64,
    pub content_length: u64,
    pub lines: u32,
    pub index: u32,
    /// Crypto state bits, owned by the signing subsystem
    pub security: u32,
    pub mime: bool,
    pub maildir_flags: Option<String>,
    pub path: Option<String>,
    pub envelope: Option<Envelope>,
    pub content: Option<Body>,
}

impl Header {
    /// A header carrying only a subject
    pub fn with_subject(subject: &str) -> Self {
        let mut envelope = Envelope::default();
        envelope.set_subject(subject);
        Self {
            envelope: Some(envelope),
            ..Self::default()
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.envelope.as_ref()?.subject.as_deref()
    }

    /// Check every intra-record offset
    pub fn is_consistent(&self) -> bool {
        self.envelope.as_ref().map_or(true, Envelope::is_consistent)
    }

    /// Canonical description of the serialized layout.
    ///
    /// Any change to the field list, order or types of the records above
    /// must be mirrored here; the blob codec fingerprints this text.
    pub const LAYOUT: &'static str = "\
Header{flags:u32,date_sent:i64,zone_offset:i32,received:i64,offset:u64,content_length:u64,\
lines:u32,index:u32,security:u32,mime:bool,maildir_flags:?str,path:?str,envelope:?Envelope,content:?Body};\
Envelope{return_path:[Address],from:[Address],to:[Address],cc:[Address],bcc:[Address],sender:[Address],\
reply_to:[Address],mail_followup_to:[Address],list_post:?str,subject:?str,real_subject_offset:?u32,\
message_id:?str,supersedes:?str,date:?str,x_label:?str,spam:?str,references:[str],in_reply_to:[str],\
user_headers:[str]};\
Address{personal:?str,mailbox:?str,group:bool};\
Body{content_type:ContentType9,subtype:?str,encoding:TransferEncoding7,disposition:Disposition3,\
parameters:[Parameter],description:?str,filename:?str,form_name:?str,xtype:?str,offset:u64,length:u64,\
header_offset:u64,parts:[Body]};\
Parameter{attribute:str,value:str}";
}
