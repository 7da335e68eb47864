use crate::b::S;

pub fn take(s: S) -> S {
    s
}
