/// Number of operand stack or local variable slots a value occupies
pub trait Width {
    fn width(&self) -> usize;
}

impl<A: Width> Width for [A] {
    fn width(&self) -> usize {
        self.iter().map(Width::width).sum()
    }
}

impl<A: Width> Width for Vec<A> {
    fn width(&self) -> usize {
        self.as_slice().width()
    }
}
