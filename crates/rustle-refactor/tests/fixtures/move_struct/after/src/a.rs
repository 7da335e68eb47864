use crate::b::S;

pub fn make() -> S {
    S
}
