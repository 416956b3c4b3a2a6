use embedded_hal::digital::StatefulOutputPin;

pub struct Led<P> {
    p: P,
}

impl<P> Led<P>
where
    P: StatefulOutputPin,
{
    pub fn new(p: P) -> Self {
        Self { p }
    }

    pub fn turn_on(&mut self) -> Result<(), P::Error> {
        self.p.set_high()
    }

    pub fn turn_off(&mut self) -> Result<(), P::Error> {
        self.p.set_low()
    }

    pub fn toggle(&mut self) -> Result<(), P::Error> {
        self.p.toggle()
    }
}
