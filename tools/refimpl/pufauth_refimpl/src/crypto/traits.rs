pub trait Hash {
    fn sha256(&self, data: &[u8]) -> [u8; 32];
}

pub trait RandomSource {
    fn fill(&mut self, dest: &mut [u8]);
}

impl<T: Hash + ?Sized> Hash for Box<T> {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        (**self).sha256(data)
    }
}

impl<T: RandomSource + ?Sized> RandomSource for Box<T> {
    fn fill(&mut self, dest: &mut [u8]) {
        (**self).fill(dest)
    }
}
