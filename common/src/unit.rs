//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity deletion.
#[derive(Clone, Copy, Debug)]
pub struct Deletion;

/// Marker type describing a value reception.
#[derive(Clone, Copy, Debug)]
pub struct Reception;

/// Marker type describing a decision upon an entity.
#[derive(Clone, Copy, Debug)]
pub struct Decision;
