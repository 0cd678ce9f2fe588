// Tests for the sync pipeline and milestone recording



#[cfg(test)]
mod test_milestones;

#[cfg(test)]
mod test_worker;
