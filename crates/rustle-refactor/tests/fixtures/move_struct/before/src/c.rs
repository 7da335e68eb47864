use crate::a::S;

pub fn take(s: S) -> S {
    s
}
