// Tests for the LCU watcher state machine



#[cfg(test)]
mod test_disconnects;
