use rand::Rng;

pub const START_SHADOW_NUMBER:u32 = 1;
pub const MAX_SHADOW_NUMBER:u32 = 8;

/// Round robin over the numbered shadow servers that take the put jobs of a batch
#[derive(Clone,Debug)]
pub struct ShadowServerPool {
    host_prefix:String,
    start:u32,
    max:u32,
    current:u32,
}

impl ShadowServerPool {
    /// pool over the standard shadow numbers, beginning at a random one
    pub fn new(host_prefix:&str) -> Self {
        let current = rand::thread_rng().gen_range(START_SHADOW_NUMBER..=MAX_SHADOW_NUMBER);
        Self::starting_at(host_prefix,START_SHADOW_NUMBER,MAX_SHADOW_NUMBER,current)
    }

    /// `current` is clamped into `[start, max]`
    pub fn starting_at(host_prefix:&str,start:u32,max:u32,current:u32) -> Self {
        let max = max.max(start);
        Self {
            host_prefix:host_prefix.to_string(),
            start,
            max,
            current:current.clamp(start,max),
        }
    }

    pub fn shadow_number(&self) -> u32 {
        self.current
    }

    pub fn increment_shadow_number(&mut self) {
        self.current = match self.current >= self.max {
            true => self.start,
            false => self.current + 1
        };
        tracing::trace!("shadow number now {}",self.current);
    }

    pub fn get_and_inc(&mut self) -> u32 {
        let current = self.current;
        self.increment_shadow_number();
        current
    }

    pub fn server_url(&self,number:u32) -> String {
        format!("http://{}{}.nrg.mir:8080",self.host_prefix,number)
    }

    /// url of the next put server
    pub fn next_put_server(&mut self) -> String {
        let n = self.get_and_inc();
        self.server_url(n)
    }
}
