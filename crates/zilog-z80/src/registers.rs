//! CPU register file.
//!
//! The Z80 keeps a shadow copy of AF and of the BC/DE/HL trio. Rather than
//! copying bytes around on `EX AF,AF'` and `EXX`, both copies live in a
//! two-slot [`Bank`] array and a pair of indexes records which slot is
//! live. The exchange instructions flip an index and nothing else, so the
//! inactive set is always intact for the next flip.

/// One complete set of the main byte registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bank {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

/// Full register state, including the interrupt and refresh registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    banks: [Bank; 2],
    /// Index of the bank holding the live AF pair.
    af_bank: u8,
    /// Index of the bank holding the live BC/DE/HL trio.
    gp_bank: u8,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
}

impl Registers {
    #[must_use]
    pub fn new() -> Self {
        let mut regs = Self {
            banks: [Bank::default(); 2],
            af_bank: 0,
            gp_bank: 0,
            ix: 0,
            iy: 0,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
        };
        regs.set_af(0xFFFF);
        regs
    }

    /// Power-on state: AF and SP float high, everything else clears.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn af_slot(&self) -> &Bank {
        &self.banks[usize::from(self.af_bank)]
    }

    fn af_slot_mut(&mut self) -> &mut Bank {
        &mut self.banks[usize::from(self.af_bank)]
    }

    fn gp_slot(&self) -> &Bank {
        &self.banks[usize::from(self.gp_bank)]
    }

    fn gp_slot_mut(&mut self) -> &mut Bank {
        &mut self.banks[usize::from(self.gp_bank)]
    }

    #[must_use]
    pub fn a(&self) -> u8 {
        self.af_slot().a
    }

    pub fn set_a(&mut self, value: u8) {
        self.af_slot_mut().a = value;
    }

    #[must_use]
    pub fn f(&self) -> u8 {
        self.af_slot().f
    }

    pub fn set_f(&mut self, value: u8) {
        self.af_slot_mut().f = value;
    }

    #[must_use]
    pub fn b(&self) -> u8 {
        self.gp_slot().b
    }

    pub fn set_b(&mut self, value: u8) {
        self.gp_slot_mut().b = value;
    }

    #[must_use]
    pub fn c(&self) -> u8 {
        self.gp_slot().c
    }

    pub fn set_c(&mut self, value: u8) {
        self.gp_slot_mut().c = value;
    }

    #[must_use]
    pub fn d(&self) -> u8 {
        self.gp_slot().d
    }

    pub fn set_d(&mut self, value: u8) {
        self.gp_slot_mut().d = value;
    }

    #[must_use]
    pub fn e(&self) -> u8 {
        self.gp_slot().e
    }

    pub fn set_e(&mut self, value: u8) {
        self.gp_slot_mut().e = value;
    }

    #[must_use]
    pub fn h(&self) -> u8 {
        self.gp_slot().h
    }

    pub fn set_h(&mut self, value: u8) {
        self.gp_slot_mut().h = value;
    }

    #[must_use]
    pub fn l(&self) -> u8 {
        self.gp_slot().l
    }

    pub fn set_l(&mut self, value: u8) {
        self.gp_slot_mut().l = value;
    }

    #[must_use]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a(), self.f()])
    }

    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.set_a(a);
        self.set_f(f);
    }

    #[must_use]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b(), self.c()])
    }

    pub fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.set_b(b);
        self.set_c(c);
    }

    #[must_use]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d(), self.e()])
    }

    pub fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.set_d(d);
        self.set_e(e);
    }

    #[must_use]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h(), self.l()])
    }

    pub fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.set_h(h);
        self.set_l(l);
    }

    /// `EX AF,AF'`: flips the AF bank index.
    pub fn exchange_af(&mut self) {
        self.af_bank ^= 1;
    }

    /// `EXX`: flips the BC/DE/HL bank index.
    pub fn exchange_gp(&mut self) {
        self.gp_bank ^= 1;
    }

    /// Advances the refresh counter by `count`, preserving bit 7.
    pub fn add_r(&mut self, count: u8) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(count) & 0x7F);
    }

    /// Raw access to one bank slot, live or shadow.
    #[must_use]
    pub fn bank(&self, index: usize) -> Bank {
        self.banks[index & 1]
    }

    pub fn set_bank(&mut self, index: usize, bank: Bank) {
        self.banks[index & 1] = bank;
    }

    #[must_use]
    pub fn af_bank_index(&self) -> u8 {
        self.af_bank
    }

    pub fn set_af_bank_index(&mut self, index: u8) {
        self.af_bank = index & 1;
    }

    #[must_use]
    pub fn gp_bank_index(&self) -> u8 {
        self.gp_bank
    }

    pub fn set_gp_bank_index(&mut self, index: u8) {
        self.gp_bank = index & 1;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
