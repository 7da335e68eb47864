pub struct S;

pub fn make() -> S {
    S
}
