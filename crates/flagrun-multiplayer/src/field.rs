//! Replicated fields: the unit of server-to-client state transfer.
//!
//! Every entity owns an ordered list of [`ReplicatedField`]s. Field ids come
//! from a per-entity [`FieldIdAllocator`], so the declaration order inside an
//! entity type decides the ids, and server and client agree on them as long
//! as every construction path declares fields in the same order.
//!
//! On the server, [`ReplicatedField::set`] also encodes the new value into
//! the entity's [`Outbox`]; the replication channel later drains it into one
//! update message per set. On the client the same call only updates the
//! local mirror.

use std::fmt::Debug;

use bytes::{BufMut, Bytes, BytesMut};
use flagrun_net::{DecodeError, WireRead, WireWrite};
use glam::Vec2;

use crate::ids::{EntityId, TeamId};

// ---------------------------------------------------------------------------
// Role / FieldId
// ---------------------------------------------------------------------------

/// Which side of the connection a world lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Authoritative; field sets are broadcast.
    Server,
    /// Mirror; field sets stay local.
    Client,
}

/// Per-entity field identifier, assigned in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub i32);

/// Hands out sequential [`FieldId`]s while an entity is being constructed.
#[derive(Debug, Default)]
pub struct FieldIdAllocator {
    next: i32,
}

impl FieldIdAllocator {
    /// Start at field id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next id.
    pub fn next_id(&mut self) -> FieldId {
        let id = FieldId(self.next);
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A value with a fixed binary layout that can live in a field.
pub trait FieldValue: Clone + Debug + PartialEq + Send + 'static {
    /// Append exactly one value.
    fn encode(&self, buf: &mut BytesMut);
    /// Read exactly one value.
    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError>;
}

impl FieldValue for i32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_int()
    }
}

impl FieldValue for i64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_long()
    }
}

impl FieldValue for f32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_f32(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_float()
    }
}

impl FieldValue for bool {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_bool(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_bool()
    }
}

impl FieldValue for String {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_string(self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_string()
    }
}

impl FieldValue for Vec2 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_vec2(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        buf.read_vec2()
    }
}

impl FieldValue for Option<EntityId> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(EntityId::to_wire(*self));
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(EntityId::from_wire(buf.read_int()?))
    }
}

impl FieldValue for Option<TeamId> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(TeamId::to_wire(*self));
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(TeamId::from_wire(buf.read_int()?))
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Encoded field values waiting for the next broadcast.
///
/// Client-role outboxes never hold anything.
#[derive(Debug, Clone)]
pub struct Outbox {
    role: Role,
    pending: Vec<(FieldId, Bytes)>,
}

impl Outbox {
    /// Empty outbox for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            pending: Vec::new(),
        }
    }

    /// Side this outbox belongs to.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Queue an encoded value. Ignored on the client.
    fn push<T: FieldValue>(&mut self, id: FieldId, value: &T) {
        if self.role == Role::Client {
            return;
        }
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        self.pending.push((id, buf.freeze()));
    }

    /// Whether anything is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued value, oldest first.
    pub fn drain(&mut self) -> Vec<(FieldId, Bytes)> {
        std::mem::take(&mut self.pending)
    }
}

// ---------------------------------------------------------------------------
// ReplicatedField
// ---------------------------------------------------------------------------

/// One server-owned, client-mirrored value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatedField<T> {
    id: FieldId,
    value: T,
    dirty: bool,
}

impl<T: FieldValue> ReplicatedField<T> {
    /// Declare a field, consuming the entity's next id.
    pub fn new(ids: &mut FieldIdAllocator, value: T) -> Self {
        Self {
            id: ids.next_id(),
            value,
            dirty: false,
        }
    }

    /// This field's id.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `value`; on the server also mark dirty and queue it.
    ///
    /// Every call queues an update, even when the value is unchanged.
    pub fn set(&mut self, value: T, outbox: &mut Outbox) {
        outbox.push(self.id, &value);
        if outbox.role() == Role::Server {
            self.dirty = true;
        }
        self.value = value;
    }

    /// Store `value` without broadcasting.
    pub fn set_local(&mut self, value: T) {
        self.value = value;
    }

    /// Whether a set happened since the last broadcast.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Type-erased access used for whole-entity encode/decode and updates.
pub trait ErasedField {
    /// Field id.
    fn id(&self) -> FieldId;
    /// Append the current value.
    fn encode_value(&self, buf: &mut BytesMut);
    /// Replace the current value with one read from `buf`.
    fn decode_value(&mut self, buf: &mut &[u8]) -> Result<(), DecodeError>;
    /// Forget a pending broadcast.
    fn clear_dirty(&mut self);
}

impl<T: FieldValue> ErasedField for ReplicatedField<T> {
    fn id(&self) -> FieldId {
        self.id
    }

    fn encode_value(&self, buf: &mut BytesMut) {
        self.value.encode(buf);
    }

    fn decode_value(&mut self, buf: &mut &[u8]) -> Result<(), DecodeError> {
        self.value = T::decode(buf)?;
        Ok(())
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: FieldValue>(value: T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let mut cursor: &[u8] = &buf;
        assert_eq!(T::decode(&mut cursor).unwrap(), value);
        assert!(cursor.is_empty(), "{value:?} left trailing bytes");
    }

    #[test]
    fn test_every_value_type_round_trips_including_zero() {
        round_trip(0i32);
        round_trip(-17i32);
        round_trip(0i64);
        round_trip(i64::MIN);
        round_trip(0.0f32);
        round_trip(-2.5f32);
        round_trip(false);
        round_trip(true);
        round_trip(String::new());
        round_trip(String::from("Zebra"));
        round_trip(Vec2::ZERO);
        round_trip(Vec2::new(400.0, -12.25));
        round_trip(None::<EntityId>);
        round_trip(Some(EntityId(0)));
        round_trip(None::<TeamId>);
        round_trip(Some(TeamId(3)));
    }

    #[test]
    fn test_absent_reference_is_minus_one() {
        let mut buf = BytesMut::new();
        None::<EntityId>.encode(&mut buf);
        assert_eq!(&buf[..], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_ids_follow_declaration_order() {
        let mut ids = FieldIdAllocator::new();
        let a = ReplicatedField::new(&mut ids, 0i32);
        let b = ReplicatedField::new(&mut ids, false);
        let c = ReplicatedField::new(&mut ids, String::new());
        assert_eq!([a.id(), b.id(), c.id()], [FieldId(0), FieldId(1), FieldId(2)]);
    }

    #[test]
    fn test_server_set_queues_every_call() {
        let mut ids = FieldIdAllocator::new();
        let mut outbox = Outbox::new(Role::Server);
        let mut field = ReplicatedField::new(&mut ids, false);

        field.set(true, &mut outbox);
        field.set(true, &mut outbox);

        assert!(field.is_dirty());
        let queued = outbox.drain();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0], (FieldId(0), Bytes::from_static(&[1])));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_client_set_stays_local() {
        let mut ids = FieldIdAllocator::new();
        let mut outbox = Outbox::new(Role::Client);
        let mut field = ReplicatedField::new(&mut ids, 1i64);

        field.set(5, &mut outbox);

        assert_eq!(*field.get(), 5);
        assert!(!field.is_dirty());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_erased_decode_replaces_value() {
        let mut ids = FieldIdAllocator::new();
        let mut field = ReplicatedField::new(&mut ids, Vec2::ZERO);
        let mut buf = BytesMut::new();
        Vec2::new(1.0, 2.0).encode(&mut buf);

        let erased: &mut dyn ErasedField = &mut field;
        let mut cursor: &[u8] = &buf;
        erased.decode_value(&mut cursor).unwrap();
        assert_eq!(*field.get(), Vec2::new(1.0, 2.0));
    }
}
