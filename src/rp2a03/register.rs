/// Selects one of the byte-wide registers on the RP2A03.
///
/// Several instruction families (loads, stores, transfers, stack pushes and
/// pulls) differ only in which register they touch, so their bodies take a
/// `Register` instead of being written out once per register. Writing
/// through the selector applies each register's flag rules in one place.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Register {
    A,
    X,
    Y,
    P,
    SP,
}
